//! Key block encodings
//!
//! | Code | Keys | Block layout |
//! |------|------|--------------|
//! | 0 | constant | inline f32 in the record |
//! | 1 | per frame | `f32` values |
//! | 2 | per frame | `f32` base, scale; `u16` values |
//! | 3 | per frame | pghalf base, scale; `u8` values |
//! | 4 | hermite | `u16` frame, pad, `f32` value, in, out |
//! | 5 | hermite | six `f32` base/scale; `u16` frame, value, in, out |
//! | 6 | hermite | six pghalf base/scale; `u8` frame, value, in, out |
//! | 7 | hermite | as 6 with a `u16` frame delta, one pad byte |
//! | 8 | hermite | as 7 with an absolute `u16` frame |

use byteorder::LittleEndian;
use serde::{Deserialize, Serialize};

use crate::cursor::{ByteReader, ByteWriter};
use crate::traits::{ParseError, ParseResult};

use super::curves::PropertyCurve;
use super::pghalf;
use super::records::{MotRecord, RawRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Constant,
    Linear,
    Hermite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyEncoding {
    Constant,
    Float,
    Quantized16,
    Quantized8,
    Hermite,
    Hermite16,
    Hermite8,
    Hermite8Delta,
    Hermite8Frame16,
}

impl KeyEncoding {
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => KeyEncoding::Constant,
            1 => KeyEncoding::Float,
            2 => KeyEncoding::Quantized16,
            3 => KeyEncoding::Quantized8,
            4 => KeyEncoding::Hermite,
            5 => KeyEncoding::Hermite16,
            6 => KeyEncoding::Hermite8,
            7 => KeyEncoding::Hermite8Delta,
            8 => KeyEncoding::Hermite8Frame16,
            _ => return None,
        })
    }

    pub fn to_raw(self) -> u8 {
        self as u8
    }

    pub fn interpolation(self) -> Interpolation {
        match self {
            KeyEncoding::Constant => Interpolation::Constant,
            KeyEncoding::Float | KeyEncoding::Quantized16 | KeyEncoding::Quantized8 => Interpolation::Linear,
            _ => Interpolation::Hermite,
        }
    }
}

/// One key; tangents are zero for non-hermite encodings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: u16,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
}

impl Keyframe {
    pub fn new(frame: u16, value: f32) -> Self {
        Self {
            frame,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
        }
    }

    pub fn hermite(frame: u16, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self {
            frame,
            value,
            in_tangent,
            out_tangent,
        }
    }
}

/// Base/scale pairs for value, in tangent and out tangent
struct Dequant([f32; 6]);

impl Dequant {
    fn read_f32(r: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        let v = r.read_f32s(6)?;
        Ok(Self([v[0], v[1], v[2], v[3], v[4], v[5]]))
    }

    fn read_pghalf(r: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        let mut out = [0.0; 6];
        for value in &mut out {
            *value = pghalf::decode(r.read_u16()?);
        }
        Ok(Self(out))
    }

    fn key(&self, frame: u16, value: f32, in_tangent: f32, out_tangent: f32) -> Keyframe {
        let b = &self.0;
        Keyframe::hermite(
            frame,
            b[0] + b[1] * value,
            b[2] + b[3] * in_tangent,
            b[4] + b[5] * out_tangent,
        )
    }
}

fn per_frame_keys(
    r: &mut ByteReader<'_, LittleEndian>,
    count: u16,
    mut value: impl FnMut(&mut ByteReader<'_, LittleEndian>) -> ParseResult<f32>,
) -> ParseResult<Vec<Keyframe>> {
    (0..count).map(|frame| Ok(Keyframe::new(frame, value(r)?))).collect()
}

/// Decode the keys of one record
pub(crate) fn decode_keys(
    reader: &mut ByteReader<'_, LittleEndian>,
    raw: &RawRecord,
    encoding: KeyEncoding,
) -> ParseResult<Vec<Keyframe>> {
    if encoding == KeyEncoding::Constant {
        return Ok(vec![Keyframe::new(0, f32::from_bits(raw.value_or_offset))]);
    }

    reader.with_position(raw.value_or_offset as usize, |r| decode_block(r, raw.key_count, encoding))
}

fn decode_block(
    r: &mut ByteReader<'_, LittleEndian>,
    count: u16,
    encoding: KeyEncoding,
) -> ParseResult<Vec<Keyframe>> {
    match encoding {
        KeyEncoding::Constant => Err(ParseError::InvalidStructure(
            "constant tracks have no key block".into(),
        )),
        KeyEncoding::Float => per_frame_keys(r, count, |r| r.read_f32()),
        KeyEncoding::Quantized16 => {
            let (base, scale) = (r.read_f32()?, r.read_f32()?);
            per_frame_keys(r, count, |r| Ok(base + scale * f32::from(r.read_u16()?)))
        }
        KeyEncoding::Quantized8 => {
            let base = pghalf::decode(r.read_u16()?);
            let scale = pghalf::decode(r.read_u16()?);
            per_frame_keys(r, count, |r| Ok(base + scale * f32::from(r.read_u8()?)))
        }
        KeyEncoding::Hermite => (0..count)
            .map(|_| {
                let frame = r.read_u16()?;
                r.skip(2)?;
                Ok(Keyframe::hermite(frame, r.read_f32()?, r.read_f32()?, r.read_f32()?))
            })
            .collect(),
        KeyEncoding::Hermite16 => {
            let dq = Dequant::read_f32(r)?;
            (0..count)
                .map(|_| {
                    let frame = r.read_u16()?;
                    let [v, i, o] = [r.read_u16()?, r.read_u16()?, r.read_u16()?].map(f32::from);
                    Ok(dq.key(frame, v, i, o))
                })
                .collect()
        }
        KeyEncoding::Hermite8 => {
            let dq = Dequant::read_pghalf(r)?;
            (0..count)
                .map(|_| {
                    let frame = u16::from(r.read_u8()?);
                    let [v, i, o] = [r.read_u8()?, r.read_u8()?, r.read_u8()?].map(f32::from);
                    Ok(dq.key(frame, v, i, o))
                })
                .collect()
        }
        KeyEncoding::Hermite8Delta | KeyEncoding::Hermite8Frame16 => {
            let dq = Dequant::read_pghalf(r)?;
            let delta = encoding == KeyEncoding::Hermite8Delta;
            let mut frame = 0u16;
            let mut keys = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let at = r.tell();
                let stored = r.read_u16()?;
                frame = if delta {
                    frame
                        .checked_add(stored)
                        .ok_or_else(|| ParseError::corrupt(at as u64, "frame delta overflows"))?
                } else {
                    stored
                };
                let [v, i, o] = [r.read_u8()?, r.read_u8()?, r.read_u8()?].map(f32::from);
                r.skip(1)?;
                keys.push(dq.key(frame, v, i, o));
            }
            Ok(keys)
        }
    }
}

/// Append the key block of `record` and return its table entry.
///
/// Single keys are stored inline, hermite keys as encoding 4 and everything
/// else as dense per-frame floats (encoding 1), resampling sparse keys.
pub(crate) fn write_key_block(w: &mut ByteWriter<LittleEndian>, record: &MotRecord) -> ParseResult<RawRecord> {
    let mut raw = RawRecord {
        bone_index: record.bone_index,
        property: record.property.to_raw(),
        encoding: KeyEncoding::Constant.to_raw(),
        key_count: 1,
        opaque: record.opaque,
        value_or_offset: 0,
    };

    let interpolation = record.interpolation();
    if interpolation == Interpolation::Constant || (record.keys.len() <= 1 && interpolation != Interpolation::Hermite) {
        raw.value_or_offset = record.keys.first().map(|k| k.value).unwrap_or(0.0).to_bits();
        return Ok(raw);
    }

    w.align(4);
    raw.value_or_offset = u32::try_from(w.tell())
        .map_err(|_| ParseError::InvalidStructure("MOT key block beyond 4 GiB".into()))?;

    if interpolation == Interpolation::Hermite {
        raw.encoding = KeyEncoding::Hermite.to_raw();
        raw.key_count = key_count(record.keys.len())?;
        for key in &record.keys {
            w.write_u16(key.frame);
            w.write_u16(0);
            w.write_f32(key.value);
            w.write_f32(key.in_tangent);
            w.write_f32(key.out_tangent);
        }
    } else {
        let curve = PropertyCurve::new(Interpolation::Linear, record.keys.clone());
        let frames = u32::from(record.last_frame()) + 1;
        raw.encoding = KeyEncoding::Float.to_raw();
        raw.key_count = key_count(frames as usize)?;
        for frame in 0..frames {
            w.write_f32(curve.sample(frame as f32));
        }
    }
    Ok(raw)
}

fn key_count(len: usize) -> ParseResult<u16> {
    u16::try_from(len).map_err(|_| ParseError::InvalidStructure(format!("{} keys exceed a 16-bit count", len)))
}
