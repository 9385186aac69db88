//! Per-property animation curves rebuilt from records

use std::collections::BTreeMap;

use serde::Serialize;

use super::keyframes::{Interpolation, Keyframe};
use super::records::{MotRecord, Property, Target};

/// A frame-indexed curve (frame 0 is the animation start)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyCurve {
    pub interpolation: Interpolation,
    pub keys: Vec<Keyframe>,
}

impl PropertyCurve {
    pub fn new(interpolation: Interpolation, keys: Vec<Keyframe>) -> Self {
        Self { interpolation, keys }
    }

    /// Evaluate at `frame`, holding the first and last values outside the keyed range
    pub fn sample(&self, frame: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if self.interpolation == Interpolation::Constant || frame <= f32::from(first.frame) {
            return first.value;
        }
        if frame >= f32::from(last.frame) {
            return last.value;
        }

        // First key strictly after `frame`; keys are sorted so this is never 0
        let next = self.keys.partition_point(|k| f32::from(k.frame) <= frame);
        let k0 = &self.keys[next - 1];
        let k1 = &self.keys[next];
        let span = f32::from(k1.frame) - f32::from(k0.frame);
        if span <= 0.0 {
            return k1.value;
        }
        let t = (frame - f32::from(k0.frame)) / span;

        match self.interpolation {
            Interpolation::Constant => k0.value,
            Interpolation::Linear => k0.value + (k1.value - k0.value) * t,
            Interpolation::Hermite => hermite(k0.value, k0.out_tangent, k1.value, k1.in_tangent, t),
        }
    }

    /// Last keyed frame
    pub fn end_frame(&self) -> u16 {
        self.keys.last().map(|k| k.frame).unwrap_or(0)
    }
}

/// Cubic hermite basis; tangents are per unit `t`
fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    (2.0 * t3 - 3.0 * t2 + 1.0) * p0 + (t3 - 2.0 * t2 + t) * m0 + (-2.0 * t3 + 3.0 * t2) * p1 + (t3 - t2) * m1
}

/// One curve driving one property of one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyAnimation {
    pub target: Target,
    pub property: Property,
    pub curve: PropertyCurve,
}

/// Build one curve per (target, property) pair.
///
/// Several records for the same pair are merged: their keys are combined in
/// frame order and the first record's interpolation is kept. Output is
/// ordered by target, then property.
pub fn build_property_animations<'a>(records: impl IntoIterator<Item = &'a MotRecord>) -> Vec<PropertyAnimation> {
    let mut merged: BTreeMap<(Target, Property), PropertyCurve> = BTreeMap::new();
    for record in records {
        merged
            .entry((record.target(), record.property))
            .and_modify(|curve| curve.keys.extend_from_slice(&record.keys))
            .or_insert_with(|| PropertyCurve::new(record.interpolation(), record.keys.clone()));
    }

    merged
        .into_iter()
        .map(|((target, property), mut curve)| {
            curve.keys.sort_by_key(|k| k.frame);
            PropertyAnimation {
                target,
                property,
                curve,
            }
        })
        .collect()
}
