//! A scene sink that records everything into a serializable document
//!
//! Useful as a headless target for the importers: the CLI dumps it as JSON,
//! and tests inspect it directly.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use stagehand_parsers::mot::{AttackInterval, PlaybackRange, PropertyAnimation};
use stagehand_parsers::transform::AXIS_WRAPPER_ANGLE;
use stagehand_parsers::{SubMesh, Transform, WmbModel};
use thiserror::Error;
use tracing::{debug, trace};

use crate::sink::{ActionInfo, CameraRole, MetadataValue, ObjectId, SceneSink};

#[derive(Error, Debug)]
pub enum JsonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type JsonResult<T> = Result<T, JsonError>;

impl From<JsonError> for stagehand_core::Error {
    fn from(err: JsonError) -> Self {
        match err {
            JsonError::Io(e) => stagehand_core::Error::Io(e),
            JsonError::Serialization(e) => stagehand_core::Error::ExportFailed { message: e.to_string() },
        }
    }
}

/// JSON scene options
#[derive(Debug, Clone)]
pub struct JsonSinkOptions {
    /// Use pretty-print formatting
    pub pretty: bool,
    /// Keep vertex positions and triangles, not just their counts
    pub include_geometry: bool,
}

impl Default for JsonSinkOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            include_geometry: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Armature,
    Camera,
    CameraTarget,
    AxisWrapper,
    Mesh,
    AttackMarker,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    #[serde(flatten)]
    pub info: ActionInfo,
    pub curves: Vec<PropertyAnimation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshRecord {
    pub vertex_count: usize,
    pub triangle_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_index: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub positions: Vec<[f32; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub triangles: Vec<[u32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneObject {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    pub transform: Transform,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bind_pose_reset: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub actions: Vec<ActionRecord>,
    /// `(frame, visible)` keys
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub visibility_keys: Vec<(i32, bool)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshRecord>,
}

impl SceneObject {
    fn new(id: ObjectId, name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            parent: None,
            collection: None,
            transform: Transform::IDENTITY,
            bind_pose_reset: false,
            actions: Vec::new(),
            visibility_keys: Vec::new(),
            mesh: None,
        }
    }
}

/// Everything written into a [`JsonSceneSink`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneDocument {
    pub objects: Vec<SceneObject>,
    /// Per-collection custom metadata
    pub collections: BTreeMap<String, BTreeMap<String, MetadataValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback: Option<PlaybackRange>,
}

impl SceneDocument {
    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn objects_of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(move |o| o.kind == kind)
    }

    pub fn metadata(&self, collection: &str, key: &str) -> Option<&MetadataValue> {
        self.collections.get(collection)?.get(key)
    }

    /// Objects in a collection, in insertion order
    pub fn collection_objects<'a>(&'a self, collection: &'a str) -> impl Iterator<Item = &'a SceneObject> + 'a {
        self.objects
            .iter()
            .filter(move |o| o.collection.as_deref() == Some(collection))
    }
}

/// In-memory sink that serializes to JSON
#[derive(Debug, Default)]
pub struct JsonSceneSink {
    options: JsonSinkOptions,
    document: SceneDocument,
    /// Bone indices known to the armature, if the scene has one
    bones: BTreeSet<u16>,
    next_id: usize,
}

impl JsonSceneSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: JsonSinkOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Start with an armature whose skeleton has exactly `bones`
    pub fn with_armature(mut self, name: &str, bones: impl IntoIterator<Item = u16>) -> Self {
        self.bones = bones.into_iter().collect();
        let id = self.alloc();
        self.document.objects.push(SceneObject::new(id, name, ObjectKind::Armature));
        self
    }

    /// Start with the armature of a decoded model; negative bone ids are ignored
    pub fn with_model_armature(self, name: &str, model: &WmbModel) -> Self {
        let bones = model.bones.iter().filter_map(|b| u16::try_from(b.id).ok());
        self.with_armature(name, bones)
    }

    pub fn document(&self) -> &SceneDocument {
        &self.document
    }

    pub fn into_document(self) -> SceneDocument {
        self.document
    }

    pub fn to_json_string(&self) -> JsonResult<String> {
        Ok(if self.options.pretty {
            serde_json::to_string_pretty(&self.document)?
        } else {
            serde_json::to_string(&self.document)?
        })
    }

    /// Write the document to `output_path`
    pub fn write(&self, output_path: impl AsRef<Path>) -> JsonResult<()> {
        let writer = BufWriter::new(File::create(output_path)?);
        if self.options.pretty {
            serde_json::to_writer_pretty(writer, &self.document)?;
        } else {
            serde_json::to_writer(writer, &self.document)?;
        }
        Ok(())
    }

    fn alloc(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    fn push(&mut self, object: SceneObject) -> ObjectId {
        let id = object.id;
        trace!(%id, name = %object.name, kind = ?object.kind, "scene object created");
        self.document.objects.push(object);
        id
    }

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.document.objects.iter_mut().find(|o| o.id == id)
    }

    fn first_of_kind(&self, kind: ObjectKind) -> Option<ObjectId> {
        self.document.objects_of_kind(kind).map(|o| o.id).next()
    }
}

impl SceneSink for JsonSceneSink {
    fn find_armature(&mut self) -> Option<ObjectId> {
        self.first_of_kind(ObjectKind::Armature)
    }

    fn reset_to_bind_pose(&mut self, armature: ObjectId) {
        if let Some(object) = self.object_mut(armature) {
            object.transform = Transform::IDENTITY;
            object.bind_pose_reset = true;
        }
    }

    fn has_bone(&self, armature: ObjectId, bone_index: u16) -> bool {
        self.document
            .object(armature)
            .is_some_and(|o| o.kind == ObjectKind::Armature)
            && self.bones.contains(&bone_index)
    }

    fn ensure_camera_object(&mut self, role: CameraRole) -> ObjectId {
        let (kind, name) = match role {
            CameraRole::Camera => (ObjectKind::Camera, "Camera"),
            CameraRole::Target => (ObjectKind::CameraTarget, "CameraTarget"),
        };
        if let Some(id) = self.first_of_kind(kind) {
            return id;
        }
        let id = self.alloc();
        self.push(SceneObject::new(id, name, kind))
    }

    fn apply_axis_wrapper(&mut self, object: ObjectId) {
        let id = self.alloc();
        let Some(target) = self.object_mut(object) else {
            return;
        };
        let mut wrapper = SceneObject::new(id, format!("{} Wrapper", target.name), ObjectKind::AxisWrapper);
        wrapper.parent = target.parent.replace(id);
        wrapper.collection = target.collection.clone();
        wrapper.transform.rotation = [AXIS_WRAPPER_ANGLE, 0.0, 0.0];
        self.push(wrapper);
    }

    fn begin_action(&mut self, object: ObjectId, action: &ActionInfo) {
        if let Some(target) = self.object_mut(object) {
            target.actions.retain(|a| a.info.name != action.name);
            target.actions.push(ActionRecord {
                info: action.clone(),
                curves: Vec::new(),
            });
        }
    }

    fn insert_curve(&mut self, object: ObjectId, animation: &PropertyAnimation) {
        let Some(target) = self.object_mut(object) else {
            return;
        };
        if target.actions.is_empty() {
            let info = ActionInfo {
                name: target.name.clone(),
                header_flags: 0,
                header_unknown: 0,
            };
            target.actions.push(ActionRecord { info, curves: Vec::new() });
        }
        if let Some(action) = target.actions.last_mut() {
            action.curves.push(animation.clone());
        }
    }

    fn clear_attack_markers(&mut self, parent: Option<ObjectId>) {
        let before = self.document.objects.len();
        self.document
            .objects
            .retain(|o| !(o.kind == ObjectKind::AttackMarker && o.parent == parent));
        debug!(removed = before - self.document.objects.len(), "attack markers cleared");
    }

    fn add_attack_marker(&mut self, parent: Option<ObjectId>, interval: &AttackInterval) -> ObjectId {
        let id = self.alloc();
        let mut marker = SceneObject::new(id, interval.name(), ObjectKind::AttackMarker);
        marker.parent = parent;
        marker.transform = Transform::new(interval.offset, interval.rotation, interval.size);
        marker.visibility_keys = interval.visibility_keys().to_vec();
        self.push(marker)
    }

    fn set_playback_range(&mut self, range: PlaybackRange) {
        self.document.playback = Some(range);
    }

    fn add_mesh(&mut self, collection: &str, mesh: &SubMesh, transform: &Transform) -> ObjectId {
        self.document.collections.entry(collection.to_string()).or_default();
        let id = self.alloc();
        let mut object = SceneObject::new(id, mesh.name.clone(), ObjectKind::Mesh);
        object.collection = Some(collection.to_string());
        object.transform = *transform;
        let (positions, triangles) = if self.options.include_geometry {
            (mesh.positions.clone(), mesh.triangles.clone())
        } else {
            (Vec::new(), Vec::new())
        };
        object.mesh = Some(MeshRecord {
            vertex_count: mesh.vertex_count(),
            triangle_count: mesh.triangle_count(),
            material_index: mesh.material_index,
            positions,
            triangles,
        });
        self.push(object)
    }

    fn set_metadata(&mut self, collection: &str, key: &str, value: MetadataValue) {
        self.document
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_parsers::mot::{Channel, Interpolation, Keyframe, Property, PropertyCurve, Target};

    fn submesh() -> SubMesh {
        SubMesh {
            name: "0-ground-0".into(),
            mesh_name: "ground".into(),
            mesh_index: 0,
            batch_index: 0,
            vertex_group_index: 0,
            material_index: Some(2),
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            triangles: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn test_axis_wrapper_reparents() {
        let mut sink = JsonSceneSink::new().with_armature("pl0010", [0, 1]);
        let armature = sink.find_armature().unwrap();
        sink.apply_axis_wrapper(armature);

        let doc = sink.document();
        let wrapper = doc.objects_of_kind(ObjectKind::AxisWrapper).next().unwrap();
        assert_eq!(doc.object(armature).unwrap().parent, Some(wrapper.id));
        assert_eq!(wrapper.parent, None);
        assert_eq!(wrapper.transform.rotation[0], AXIS_WRAPPER_ANGLE);
    }

    #[test]
    fn test_camera_objects_are_reused() {
        let mut sink = JsonSceneSink::new();
        let cam = sink.ensure_camera_object(CameraRole::Camera);
        let target = sink.ensure_camera_object(CameraRole::Target);
        assert_ne!(cam, target);
        assert_eq!(sink.ensure_camera_object(CameraRole::Camera), cam);
        assert_eq!(sink.document().objects.len(), 2);
        assert_eq!(sink.find_armature(), None);
    }

    #[test]
    fn test_begin_action_replaces_same_name() {
        let mut sink = JsonSceneSink::new().with_armature("pl0010", [3]);
        let armature = sink.find_armature().unwrap();
        let info = ActionInfo {
            name: "run".into(),
            header_flags: 1,
            header_unknown: 2,
        };
        let animation = PropertyAnimation {
            target: Target::Bone(3),
            property: Property::new(Channel::Location, 0),
            curve: PropertyCurve::new(Interpolation::Linear, vec![Keyframe::new(0, 1.0)]),
        };

        sink.begin_action(armature, &info);
        sink.insert_curve(armature, &animation);
        sink.begin_action(armature, &info);

        let object = sink.document().object(armature).unwrap();
        assert_eq!(object.actions.len(), 1);
        assert!(object.actions[0].curves.is_empty());
        assert!(sink.has_bone(armature, 3));
        assert!(!sink.has_bone(armature, 4));
    }

    #[test]
    fn test_mesh_geometry_is_optional() {
        let mut sink = JsonSceneSink::new();
        let id = sink.add_mesh("r100_a", &submesh(), &Transform::IDENTITY);
        let mesh = sink.document().object(id).unwrap().mesh.clone().unwrap();
        assert_eq!((mesh.vertex_count, mesh.triangle_count), (3, 1));
        assert!(mesh.positions.is_empty());

        let mut full = JsonSceneSink::with_options(JsonSinkOptions {
            pretty: false,
            include_geometry: true,
        });
        let id = full.add_mesh("r100_a", &submesh(), &Transform::IDENTITY);
        assert_eq!(full.document().object(id).unwrap().mesh.as_ref().unwrap().triangles, [[0, 1, 2]]);
        assert!(!full.to_json_string().unwrap().contains('\n'));
    }

    #[test]
    fn test_write_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonSceneSink::new();
        sink.set_metadata("WMB", "ly2_flags", MetadataValue::Int(7));
        sink.set_playback_range(PlaybackRange {
            start: 0,
            end: 59,
            fps: 60.0,
        });
        let path = dir.path().join("scene.json");
        sink.write(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["collections"]["WMB"]["ly2_flags"], 7);
        assert_eq!(value["playback"]["end"], 59);
    }
}
