//! MOT animations into a scene
//!
//! Order of operations, which sinks may rely on:
//!
//! 1. armature tracks: bind pose, axis wrapper, action, curves
//! 2. camera tracks: target and camera ensured and wrapped, actions, curves
//! 3. attack markers from the first `<name>_<n>_seq.bxm` sibling
//! 4. playback range

use std::path::{Path, PathBuf};

use serde::Serialize;
use stagehand_core::{DecodeReport, DiagnosticKind, Result, ResultExt};
use stagehand_parsers::mot::{
    self, build_property_animations, Classification, MotFile, MotRecord, PropertyAnimation, Target,
};
use stagehand_parsers::ErrorClass;
use tracing::{debug, info, warn};

use crate::sink::{ActionInfo, CameraRole, SceneSink};

/// What one MOT import did
#[derive(Debug, Clone, Serialize)]
pub struct MotImportSummary {
    pub animation: String,
    pub classification: Classification,
    pub frame_count: u16,
    pub armature_curves: usize,
    pub camera_curves: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq_file: Option<PathBuf>,
    pub attack_markers: usize,
    pub report: DecodeReport,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MotImporter;

impl MotImporter {
    pub fn new() -> Self {
        Self
    }

    /// Decode `mot_path` and write it into `sink`
    pub fn import(&self, mot_path: &Path, sink: &mut dyn SceneSink) -> Result<MotImportSummary> {
        let bytes = std::fs::read(mot_path)
            .map_err(stagehand_core::Error::from)
            .with_context(|| format!("reading {}", mot_path.display()))?;
        let mot = MotFile::decode(&bytes)
            .map_err(stagehand_core::Error::from)
            .with_context(|| format!("decoding {}", mot_path.display()))?;
        self.import_decoded(&mot, mot_path, sink)
    }

    /// Write an already decoded file; `mot_path` locates its sequence siblings
    pub fn import_decoded(&self, mot: &MotFile, mot_path: &Path, sink: &mut dyn SceneSink) -> Result<MotImportSummary> {
        let classification = mot.classify();
        let mut report = mot.report.clone();
        let (armature_records, camera_records) = mot::partition(&mot.records);

        let armature_curves = if classification.has_armature {
            import_armature(mot, &armature_records, sink, &mut report)
        } else {
            0
        };
        let camera_curves = if classification.has_camera {
            import_camera(mot, &camera_records, sink)
        } else {
            0
        };
        let (seq_file, attack_markers) = import_attack_markers(mot_path, sink, &mut report);

        sink.set_playback_range(mot.playback_range());
        info!(
            animation = %mot.header.name,
            armature_curves,
            camera_curves,
            attack_markers,
            skipped = report.len(),
            "MOT imported"
        );

        Ok(MotImportSummary {
            animation: mot.header.name.clone(),
            classification,
            frame_count: mot.header.frame_count,
            armature_curves,
            camera_curves,
            seq_file,
            attack_markers,
            report,
        })
    }
}

fn action_info(mot: &MotFile, name: String) -> ActionInfo {
    ActionInfo {
        name,
        header_flags: mot.header.flags,
        header_unknown: mot.header.unknown,
    }
}

fn import_armature(
    mot: &MotFile,
    records: &[&MotRecord],
    sink: &mut dyn SceneSink,
    report: &mut DecodeReport,
) -> usize {
    let Some(armature) = sink.find_armature() else {
        warn!(records = records.len(), "no armature in scene, dropping bone tracks");
        report.skip(
            DiagnosticKind::UnresolvedBone,
            "armature",
            format!("{} bone records without an armature", records.len()),
        );
        return 0;
    };

    sink.reset_to_bind_pose(armature);
    sink.apply_axis_wrapper(armature);
    sink.begin_action(armature, &action_info(mot, mot.header.name.clone()));

    let kept: Vec<&MotRecord> = records
        .iter()
        .copied()
        .filter(|record| match record.target() {
            Target::Bone(bone) if !sink.has_bone(armature, bone) => {
                warn!(bone, "bone not found in armature");
                report.skip(
                    DiagnosticKind::UnresolvedBone,
                    format!("bone {}", bone),
                    format!("{:?} track has no bone to drive", record.property),
                );
                false
            }
            _ => true,
        })
        .collect();

    let animations = build_property_animations(kept);
    for animation in &animations {
        sink.insert_curve(armature, animation);
    }
    debug!(curves = animations.len(), "armature curves applied");
    animations.len()
}

fn import_camera(mot: &MotFile, records: &[&MotRecord], sink: &mut dyn SceneSink) -> usize {
    // Both objects exist and are wrapped before any key lands on either
    let target = sink.ensure_camera_object(CameraRole::Target);
    let camera = sink.ensure_camera_object(CameraRole::Camera);
    sink.apply_axis_wrapper(camera);
    sink.apply_axis_wrapper(target);

    for (object, role) in [(camera, CameraRole::Camera), (target, CameraRole::Target)] {
        let name = format!("{} - {}", mot.header.name, role.action_suffix());
        sink.begin_action(object, &action_info(mot, name));
    }

    let animations: Vec<PropertyAnimation> = build_property_animations(records.iter().copied());
    for animation in &animations {
        let object = match animation.target {
            Target::Camera => camera,
            Target::CameraTarget => target,
            _ => continue,
        };
        sink.insert_curve(object, animation);
    }
    debug!(curves = animations.len(), "camera curves applied");
    animations.len()
}

fn import_attack_markers(
    mot_path: &Path,
    sink: &mut dyn SceneSink,
    report: &mut DecodeReport,
) -> (Option<PathBuf>, usize) {
    if mot::find_seq_sibling(mot_path).is_none() {
        return (None, 0);
    }

    let (path, intervals, seq_report) = match mot::load_attack_intervals(mot_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            let kind = match e.class() {
                ErrorClass::ResourceNotFound => DiagnosticKind::ResourceNotFound,
                _ => DiagnosticKind::CorruptRecord,
            };
            warn!(error = %e, "attack sequence not loaded");
            report.skip(kind, "attack sequence", e.to_string());
            return (None, 0);
        }
    };
    report.merge(seq_report);

    let parent = sink.find_armature();
    sink.clear_attack_markers(parent);
    for interval in &intervals {
        sink.add_attack_marker(parent, interval);
    }
    (Some(path), intervals.len())
}
