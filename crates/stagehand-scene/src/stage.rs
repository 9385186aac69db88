//! SCR stages (and their LY2 props) into a scene
//!
//! Layout the importer expects around `<dir>/<stage>.scr`:
//!
//! ```text
//! <dir>/<stage>.scr
//! <dir>/<stage>.ly2                      optional prop layout
//! <dir>/extracted_scr/<model>.wmb        written by the import
//! <dir>/../<prop>.dat/<prop>.wmb         extracted prop
//! <dir>/../../../<category>/<prop>.dtt   archived prop
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use rayon::prelude::*;
use serde::Serialize;
use stagehand_core::{DecodeReport, Diagnostic, DiagnosticKind, ImportMode, Result, ResultExt};
use stagehand_parsers::ly2::{decode_ly2, Ly2Layout, PropSource};
use stagehand_parsers::scr::{extraction_dir, ly2_sibling_path, ScrFile, ScrModel};
use stagehand_parsers::{DatArchive, ParseOptions, ParseResult, SubMesh, WmbModel};
use stagehand_vfs::FsPropResolver;
use tracing::{debug, info, warn};

use crate::sink::{MetadataValue, SceneSink};

/// Directory, next to the SCR, that embedded models are written to
pub const DEFAULT_EXTRACT_DIR: &str = "extracted_scr";

/// Collection that stage-wide LY2 metadata is attached to
pub const STAGE_COLLECTION: &str = "WMB";

#[derive(Debug, Clone)]
pub struct StageOptions {
    pub mode: ImportMode,
    pub extract_dir_name: String,
    /// Decode embedded models and props on the rayon pool
    pub parallel: bool,
    /// Options for every embedded WMB decode
    pub parse: ParseOptions,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            mode: ImportMode::default(),
            extract_dir_name: DEFAULT_EXTRACT_DIR.to_string(),
            parallel: true,
            parse: ParseOptions::default(),
        }
    }
}

/// What one stage import did
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub scr_path: PathBuf,
    pub mode: ImportMode,
    pub extract_dir: PathBuf,
    /// Files written, in container order
    pub extracted: Vec<PathBuf>,
    pub models_imported: usize,
    pub submeshes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ly2_path: Option<PathBuf>,
    pub props_loaded: usize,
    pub placements: usize,
    pub report: DecodeReport,
}

pub struct StageImporter {
    options: StageOptions,
}

impl StageImporter {
    pub fn new(options: StageOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &StageOptions {
        &self.options
    }

    /// Extract `scr_path`, place its LY2 props in `sink` and, in
    /// [`ImportMode::ExtractAndImport`], its embedded models too.
    ///
    /// Only SCR read and header failures are errors. A model or prop that
    /// cannot be decoded or found is reported and skipped.
    pub fn import(&self, scr_path: &Path, sink: &mut dyn SceneSink) -> Result<StageReport> {
        let data = std::fs::read(scr_path)
            .map_err(stagehand_core::Error::from)
            .with_context(|| format!("reading {}", scr_path.display()))?;
        let scr = ScrFile::decode_shared(Bytes::from(data))
            .map_err(stagehand_core::Error::from)
            .with_context(|| format!("decoding {}", scr_path.display()))?;

        let (models, mut report) = scr.non_empty_models();
        let extract_dir = extraction_dir(scr_path, &self.options.extract_dir_name);
        let extracted = extract_models(&models, &extract_dir)?;

        let mut stage = StageReport {
            scr_path: scr_path.to_path_buf(),
            mode: self.options.mode,
            extract_dir,
            extracted,
            models_imported: 0,
            submeshes: 0,
            ly2_path: None,
            props_loaded: 0,
            placements: 0,
            report: DecodeReport::new(),
        };

        if self.options.mode.imports() {
            self.import_models(&models, sink, &mut stage, &mut report);
        } else {
            info!(stage = %scr_path.display(), files = stage.extracted.len(), "SCR extracted");
        }

        let ly2_path = ly2_sibling_path(scr_path);
        if ly2_path.is_file() {
            self.import_props(scr_path, &ly2_path, sink, &mut stage, &mut report);
            stage.ly2_path = Some(ly2_path);
        } else {
            debug!(path = %ly2_path.display(), "no prop layout");
        }

        info!(
            stage = %scr_path.display(),
            models = stage.models_imported,
            props = stage.props_loaded,
            placements = stage.placements,
            skipped = report.len(),
            "SCR imported"
        );
        stage.report = report;
        Ok(stage)
    }

    fn import_models(
        &self,
        models: &[&ScrModel],
        sink: &mut dyn SceneSink,
        stage: &mut StageReport,
        report: &mut DecodeReport,
    ) {
        let decoded = map_maybe_parallel(models, self.options.parallel, |model| {
            decode_submeshes(&model.data, &self.options.parse)
        });

        for (model, result) in models.iter().zip(decoded) {
            match result {
                Ok(submeshes) => {
                    for submesh in &submeshes {
                        sink.add_mesh(&model.name, submesh, &model.transform);
                    }
                    sink.set_metadata(&model.name, "mystery_int16s", MetadataValue::ints(&model.opaque));
                    stage.models_imported += 1;
                    stage.submeshes += submeshes.len();
                }
                Err(e) => {
                    warn!(model = %model.name, error = %e, "embedded model not imported");
                    report.skip(DiagnosticKind::CorruptRecord, model.file_name(), e.to_string());
                }
            }
        }
    }

    fn import_props(
        &self,
        scr_path: &Path,
        ly2_path: &Path,
        sink: &mut dyn SceneSink,
        stage: &mut StageReport,
        report: &mut DecodeReport,
    ) {
        let entry = ly2_path.display().to_string();
        let bytes = match std::fs::read(ly2_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %entry, error = %e, "prop layout vanished");
                report.skip(DiagnosticKind::ResourceNotFound, entry, e.to_string());
                return;
            }
        };
        let resolver = FsPropResolver::for_scr(scr_path);
        let layout = match decode_ly2(&bytes, &resolver) {
            Ok(layout) => layout,
            Err(e) => {
                warn!(path = %entry, error = %e, "prop layout not loaded");
                report.skip(DiagnosticKind::CorruptRecord, entry, e.to_string());
                return;
            }
        };
        let Ly2Layout {
            flags,
            prop_types,
            placements,
            trailer,
            report: layout_report,
        } = layout;
        report.merge(layout_report);

        sink.set_metadata(STAGE_COLLECTION, "ly2_flags", MetadataValue::Int(i64::from(flags)));
        for (column, key) in ["ly2_other_flags", "ly2_mystery_b", "ly2_mystery_c"].into_iter().enumerate() {
            let values: Vec<u32> = trailer.iter().map(|row| row[column]).collect();
            sink.set_metadata(STAGE_COLLECTION, key, MetadataValue::ints(&values));
        }

        // Each prop is loaded once no matter how many types or instances name it
        let sources: BTreeMap<&str, &PropSource> =
            prop_types.iter().map(|p| (p.name.as_str(), &p.source)).collect();
        let sources: Vec<(&str, &PropSource)> = sources.into_iter().collect();
        let loaded = map_maybe_parallel(&sources, self.options.parallel, |(name, source)| {
            load_prop(name, source, &self.options.parse)
        });

        let mut meshes: HashMap<&str, Vec<SubMesh>> = HashMap::new();
        for ((name, _), result) in sources.iter().zip(loaded) {
            match result {
                Ok(submeshes) => {
                    meshes.insert(*name, submeshes);
                }
                Err(diagnostic) => {
                    warn!(prop = *name, message = %diagnostic.message, "prop not loaded");
                    report.push(diagnostic);
                }
            }
        }
        stage.props_loaded = meshes.len();

        for prop in &prop_types {
            if meshes.contains_key(prop.name.as_str()) {
                sink.set_metadata(&prop.name, "flags", MetadataValue::ints(&prop.flags));
            }
        }
        for placement in &placements {
            let Some(submeshes) = meshes.get(placement.prop_name.as_str()) else {
                continue;
            };
            for submesh in submeshes {
                sink.add_mesh(&placement.prop_name, submesh, &placement.transform);
            }
            stage.placements += 1;
        }
    }
}

impl Default for StageImporter {
    fn default() -> Self {
        Self::new(StageOptions::default())
    }
}

fn map_maybe_parallel<T, R, F>(items: &[T], parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

/// Write every model to `<dir>/<name>.wmb`, creating `dir` only when there is something to write
fn extract_models(models: &[&ScrModel], dir: &Path) -> Result<Vec<PathBuf>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(dir)
        .map_err(stagehand_core::Error::from)
        .with_context(|| format!("creating {}", dir.display()))?;

    let mut written = Vec::with_capacity(models.len());
    for model in models {
        let path = dir.join(model.file_name());
        std::fs::write(&path, &model.data)
            .map_err(stagehand_core::Error::from)
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), bytes = model.data.len(), "model extracted");
        written.push(path);
    }
    Ok(written)
}

fn decode_submeshes(data: &[u8], options: &ParseOptions) -> ParseResult<Vec<SubMesh>> {
    WmbModel::decode(data)?.submeshes(options)
}

/// Load a prop's geometry from a plain WMB or the first WMB inside a DTT.
///
/// The resolver only checked existence; a read failure here is a missing
/// resource, not an I/O error.
fn load_prop(name: &str, source: &PropSource, options: &ParseOptions) -> std::result::Result<Vec<SubMesh>, Diagnostic> {
    let path = source.path();
    let not_found = |message: String| Diagnostic::new(DiagnosticKind::ResourceNotFound, name, message);
    let corrupt = |message: String| Diagnostic::new(DiagnosticKind::CorruptRecord, name, message);

    let bytes = std::fs::read(path).map_err(|e| not_found(format!("{}: {}", path.display(), e)))?;
    let wmb = match source {
        PropSource::ExtractedWmb(_) => Bytes::from(bytes),
        PropSource::ArchivedDtt(_) => {
            let archive = DatArchive::decode_shared(Bytes::from(bytes)).map_err(|e| corrupt(e.to_string()))?;
            archive
                .first_with_extension("wmb")
                .map(|entry| entry.data.clone())
                .ok_or_else(|| not_found(format!("{} holds no .wmb", path.display())))?
        }
    };
    decode_submeshes(&wmb, options).map_err(|e| corrupt(e.to_string()))
}
