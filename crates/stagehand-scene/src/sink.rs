//! The capability interface importers write into
//!
//! Importers never look up scene objects by name or reach for globals. Every
//! lookup ("the armature", "the camera") and every mutation goes through a
//! [`SceneSink`] handed to them by the caller.

use std::fmt;

use serde::Serialize;
use stagehand_parsers::mot::{AttackInterval, PlaybackRange, PropertyAnimation};
use stagehand_parsers::{SubMesh, Transform};

/// Handle to an object owned by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(pub usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two objects a camera animation drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraRole {
    Camera,
    Target,
}

impl CameraRole {
    /// Suffix appended to the animation name for this object's action
    pub fn action_suffix(&self) -> &'static str {
        match self {
            CameraRole::Camera => "Camera",
            CameraRole::Target => "Target",
        }
    }
}

/// An animation action about to receive curves
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionInfo {
    pub name: String,
    /// MOT header flags, kept for re-export
    pub header_flags: u16,
    /// MOT header opaque word
    pub header_unknown: u32,
}

/// Value attached to a collection as custom metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Ints(Vec<i64>),
    Text(String),
}

impl MetadataValue {
    pub fn ints<T: Into<i64> + Copy>(values: &[T]) -> Self {
        MetadataValue::Ints(values.iter().map(|&v| v.into()).collect())
    }
}

/// A target scene that decoded records are written into.
///
/// Implementations own all object bookkeeping. Importers call these in a
/// fixed order documented on each importer; a sink may assume, for example,
/// that `begin_action` precedes every `insert_curve` on the same object.
pub trait SceneSink {
    /// The armature animations apply to, if the scene has one
    fn find_armature(&mut self) -> Option<ObjectId>;

    /// Put the armature in its bind pose with every bone transform zeroed
    fn reset_to_bind_pose(&mut self, armature: ObjectId);

    /// Whether the armature has a bone for `bone_index`
    fn has_bone(&self, armature: ObjectId, bone_index: u16) -> bool;

    /// Find or create the camera or camera target
    fn ensure_camera_object(&mut self, role: CameraRole) -> ObjectId;

    /// Parent `object` under a 90° rotation about X, converting Z-up to Y-up.
    ///
    /// Called once per object per import. Wrapping twice is not detected.
    fn apply_axis_wrapper(&mut self, object: ObjectId);

    /// Start a fresh action on `object`, replacing any action of the same name
    fn begin_action(&mut self, object: ObjectId, action: &ActionInfo);

    fn insert_curve(&mut self, object: ObjectId, animation: &PropertyAnimation);

    /// Remove attack markers left by an earlier import
    fn clear_attack_markers(&mut self, parent: Option<ObjectId>);

    /// Add a box marker visible only within the interval
    fn add_attack_marker(&mut self, parent: Option<ObjectId>, interval: &AttackInterval) -> ObjectId;

    fn set_playback_range(&mut self, range: PlaybackRange);

    /// Add one submesh, placed by `transform`, to the named collection
    fn add_mesh(&mut self, collection: &str, mesh: &SubMesh, transform: &Transform) -> ObjectId;

    fn set_metadata(&mut self, collection: &str, key: &str, value: MetadataValue);
}
