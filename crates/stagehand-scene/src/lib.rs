//! Scene adapters for decoded stagehand assets
//!
//! The codecs in `stagehand-parsers` only produce records. This crate maps
//! those records onto a target scene through the [`SceneSink`] capability
//! trait:
//! - [`MotImporter`]: armature and camera curves, attack markers, playback range
//! - [`StageImporter`]: SCR extraction, embedded models, LY2 prop placement
//! - [`JsonSceneSink`]: headless sink that serializes the resulting scene
//! - [`ObjWriter`]: Wavefront OBJ output for submeshes

pub mod json;
pub mod mot_import;
pub mod obj;
pub mod sink;
pub mod stage;

pub use json::{JsonError, JsonSceneSink, JsonSinkOptions, ObjectKind, SceneDocument, SceneObject};
pub use mot_import::{MotImportSummary, MotImporter};
pub use obj::{ObjExportOptions, ObjWriter};
pub use sink::{ActionInfo, CameraRole, MetadataValue, ObjectId, SceneSink};
pub use stage::{StageImporter, StageOptions, StageReport, DEFAULT_EXTRACT_DIR, STAGE_COLLECTION};
