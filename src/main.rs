//! stagehand CLI
//!
//! Command-line interface for inspecting and converting WMB models, MOT
//! animations, SCR/LY2 stages and BXM documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use stagehand_core::{DecodeReport, ImportMode};
use stagehand_parsers::logging::{self, TracingConfig};
use stagehand_parsers::{AnyParser, BxmDocument, HumanReadable, ParseOptions, WmbModel, GLOBAL_REGISTRY};
use stagehand_scene::{
    JsonSceneSink, JsonSinkOptions, MotImporter, ObjExportOptions, ObjWriter, StageImporter, StageOptions,
    DEFAULT_EXTRACT_DIR,
};

/// stagehand - asset extraction for WMB/MOT/SCR/LY2/BXM game files
#[derive(Parser)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the formats stagehand can read
    Formats,

    /// Show a summary of any supported file
    Info(InfoArgs),

    /// Decode a WMB model
    Wmb(WmbArgs),

    /// Import a MOT animation into a scene document
    Mot(MotArgs),

    /// Extract an SCR stage and place its LY2 props
    Scr(ScrArgs),

    /// Print a BXM document as a tree
    Bxm(BxmArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Path to the file
    path: PathBuf,
}

#[derive(Args)]
struct WmbArgs {
    /// Path to the WMB file
    path: PathBuf,

    /// Write the submeshes as Wavefront OBJ
    #[arg(long)]
    obj: Option<PathBuf>,

    /// Reject partial triangles instead of dropping them
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct MotArgs {
    /// Path to the MOT file
    path: PathBuf,

    /// Write the resulting scene as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// WMB whose skeleton receives the bone tracks
    #[arg(long)]
    model: Option<PathBuf>,
}

#[derive(Args)]
struct ScrArgs {
    /// Path to the SCR file
    path: PathBuf,

    /// Write embedded models to disk without importing them
    #[arg(long)]
    extract_only: bool,

    /// Write the resulting scene as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Directory name, next to the SCR, for extracted models
    #[arg(long, default_value = DEFAULT_EXTRACT_DIR)]
    extract_dir: String,

    /// Decode embedded models on a single thread
    #[arg(long)]
    sequential: bool,

    /// Keep vertex data in the scene JSON
    #[arg(long)]
    geometry: bool,
}

#[derive(Args)]
struct BxmArgs {
    /// Path to the BXM file (.bxm, .sop, .gad, .seq)
    path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_config(TracingConfig::from_verbosity(cli.verbose));
    stagehand_parsers::init_registry();

    match cli.command {
        Commands::Formats => cmd_formats(cli.format),
        Commands::Info(args) => cmd_info(args, cli.format),
        Commands::Wmb(args) => cmd_wmb(args, cli.format),
        Commands::Mot(args) => cmd_mot(args, cli.format),
        Commands::Scr(args) => cmd_scr(args, cli.format),
        Commands::Bxm(args) => cmd_bxm(args, cli.format),
    }
}

/// Print `value` as JSON or YAML, or `text` for the text format
fn emit<T: Serialize>(value: &T, format: OutputFormat, text: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn cmd_formats(format: OutputFormat) -> Result<()> {
    let parsers = GLOBAL_REGISTRY.list();
    emit(&parsers, format, || {
        let mut out = format!("{:<6} {:<30} {}\n", "ID", "Parser", "Extensions");
        out.push_str(&format!("{:-<6} {:-<30} {:-<20}", "", "", ""));
        for parser in &parsers {
            out.push_str(&format!(
                "\n{:<6} {:<30} {}",
                parser.id,
                parser.name,
                parser.extensions.join(", ")
            ));
        }
        out
    })
}

/// Parser by extension, falling back to the file's magic
fn detect_parser(path: &Path, data: &[u8]) -> Option<Arc<dyn AnyParser>> {
    if let Ok(parser) = GLOBAL_REGISTRY.get_for_path(path) {
        return Some(parser);
    }
    GLOBAL_REGISTRY
        .list()
        .into_iter()
        .filter_map(|info| GLOBAL_REGISTRY.get(&info.id).ok())
        .find(|parser| parser.magic_bytes().is_some_and(|magic| data.starts_with(magic)))
}

fn cmd_info(args: InfoArgs, format: OutputFormat) -> Result<()> {
    let data = read_input(&args.path)?;
    let Some(parser) = detect_parser(&args.path, &data) else {
        bail!("No parser recognises {}", args.path.display());
    };
    info!(parser = parser.name(), path = %args.path.display(), "Decoding");

    let decoded = parser
        .describe(&data, &ParseOptions::default())
        .with_context(|| format!("Failed to decode {} with {}", args.path.display(), parser.name()))?;
    match format {
        OutputFormat::Text => {
            println!("{} ({}, {})", args.path.display(), parser.name(), format_size(data.len() as u64));
            println!("{}", decoded.to_readable_string());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decoded.to_json())?),
        OutputFormat::Yaml => print!("{}", decoded.to_yaml()),
    }
    Ok(())
}

#[derive(Serialize)]
struct WmbSummary {
    vertex_groups: usize,
    batches: usize,
    meshes: usize,
    materials: usize,
    bones: usize,
    vertices: usize,
    submeshes: Vec<SubMeshSummary>,
}

#[derive(Serialize)]
struct SubMeshSummary {
    name: String,
    vertices: usize,
    triangles: usize,
    material: Option<u16>,
}

fn cmd_wmb(args: WmbArgs, format: OutputFormat) -> Result<()> {
    let data = read_input(&args.path)?;
    let model = WmbModel::decode(&data).with_context(|| format!("Failed to decode {}", args.path.display()))?;
    let options = ParseOptions {
        strict_validation: args.strict,
        ..ParseOptions::default()
    };
    let submeshes = model.submeshes(&options).context("Failed to build submeshes")?;

    if let Some(obj_path) = &args.obj {
        ObjWriter::new(ObjExportOptions::default())
            .write_file(&submeshes, obj_path)
            .with_context(|| format!("Failed to write {}", obj_path.display()))?;
        info!(path = %obj_path.display(), "OBJ written");
    }

    let summary = WmbSummary {
        vertex_groups: model.vertex_groups.len(),
        batches: model.batches.len(),
        meshes: model.meshes.len(),
        materials: model.materials.len(),
        bones: model.bones.len(),
        vertices: model.vertex_count(),
        submeshes: submeshes
            .iter()
            .map(|s| SubMeshSummary {
                name: s.name.clone(),
                vertices: s.vertex_count(),
                triangles: s.triangle_count(),
                material: s.material_index,
            })
            .collect(),
    };
    emit(&summary, format, || {
        let mut out = format!(
            "WMB: {}\n  Vertex groups: {}\n  Batches:       {}\n  Meshes:        {}\n  Materials:     {}\n  Bones:         {}\n",
            args.path.display(),
            summary.vertex_groups,
            summary.batches,
            summary.meshes,
            summary.materials,
            summary.bones
        );
        for s in &summary.submeshes {
            out.push_str(&format!("\n  {:<32} {:>6} verts {:>6} tris", s.name, s.vertices, s.triangles));
        }
        out
    })
}

fn cmd_mot(args: MotArgs, format: OutputFormat) -> Result<()> {
    let mut sink = JsonSceneSink::new();
    if let Some(model_path) = &args.model {
        let model = WmbModel::decode(&read_input(model_path)?)
            .with_context(|| format!("Failed to decode {}", model_path.display()))?;
        let name = model_path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        debug!(bones = model.bones.len(), "Armature loaded");
        sink = sink.with_model_armature(&name, &model);
    }

    let summary = MotImporter::new().import(&args.path, &mut sink)?;
    if let Some(json_path) = &args.json {
        sink.write(json_path)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
    }

    emit(&summary, format, || {
        let mut out = format!(
            "MOT: {}\n  Animation:       {}\n  Frames:          {}\n  Armature curves: {}\n  Camera curves:   {}\n  Attack markers:  {}",
            args.path.display(),
            summary.animation,
            summary.frame_count,
            summary.armature_curves,
            summary.camera_curves,
            summary.attack_markers
        );
        out.push_str(&format_report(&summary.report));
        out
    })
}

fn cmd_scr(args: ScrArgs, format: OutputFormat) -> Result<()> {
    let mode = if args.extract_only {
        ImportMode::ExtractOnly
    } else {
        ImportMode::ExtractAndImport
    };
    let importer = StageImporter::new(StageOptions {
        mode,
        extract_dir_name: args.extract_dir.clone(),
        parallel: !args.sequential,
        ..StageOptions::default()
    });
    let mut sink = JsonSceneSink::with_options(JsonSinkOptions {
        include_geometry: args.geometry,
        ..JsonSinkOptions::default()
    });

    let report = importer.import(&args.path, &mut sink)?;
    if let Some(json_path) = &args.json {
        sink.write(json_path)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
    }

    emit(&report, format, || {
        let mut out = format!(
            "SCR: {} ({})\n  Extracted:  {} files into {}\n  Models:     {} ({} submeshes)\n  Props:      {} ({} placements)",
            args.path.display(),
            report.mode,
            report.extracted.len(),
            report.extract_dir.display(),
            report.models_imported,
            report.submeshes,
            report.props_loaded,
            report.placements
        );
        out.push_str(&format_report(&report.report));
        out
    })
}

fn cmd_bxm(args: BxmArgs, format: OutputFormat) -> Result<()> {
    let data = read_input(&args.path)?;
    let document = BxmDocument::decode(&data).with_context(|| format!("Failed to decode {}", args.path.display()))?;
    match format {
        OutputFormat::Text => print!("{}", document.to_readable_string()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&document.to_json())?),
        OutputFormat::Yaml => print!("{}", document.to_yaml()),
    }
    Ok(())
}

fn format_report(report: &DecodeReport) -> String {
    if report.is_clean() {
        return String::new();
    }
    let mut out = format!("\n\nSkipped ({}):", report.len());
    for diagnostic in report.iter() {
        out.push_str(&format!("\n  {}", diagnostic));
    }
    out
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
