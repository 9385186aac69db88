//! Attack-timing sequences stored next to a MOT in `<name>_<n>_seq.bxm`

use std::path::{Path, PathBuf};

use serde::Serialize;
use stagehand_core::{DecodeReport, DiagnosticKind};
use tracing::{debug, warn};

use crate::bxm::{BxmDocument, BxmNode};
use crate::traits::{ParseError, ParseResult};
use crate::transform::seconds_to_frame;

/// Number of numbered sequence siblings probed
pub const SEQ_SIBLING_SLOTS: usize = 3;

/// An attack volume, active over an inclusive frame interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackInterval {
    pub start_frame: i32,
    pub end_frame: i32,
    pub shape: i32,
    pub offset: [f32; 3],
    pub rotation: [f32; 3],
    pub size: [f32; 3],
}

impl AttackInterval {
    /// Marker name, e.g. `Attack30-45`
    pub fn name(&self) -> String {
        format!("Attack{}-{}", self.start_frame, self.end_frame)
    }

    /// Visibility keys: hidden just outside the interval, visible at both ends
    pub fn visibility_keys(&self) -> [(i32, bool); 4] {
        [
            (self.start_frame - 1, false),
            (self.start_frame, true),
            (self.end_frame, true),
            (self.end_frame + 1, false),
        ]
    }

    pub fn is_visible_at(&self, frame: i32) -> bool {
        (self.start_frame..=self.end_frame).contains(&frame)
    }

    fn from_node(node: &BxmNode) -> Result<Self, String> {
        let attr = |name: &str| node.attribute(name).ok_or_else(|| format!("missing {}", name));
        let float = |name: &str| -> Result<f32, String> {
            attr(name)?.trim().parse().map_err(|_| format!("{} is not a number", name))
        };
        let vec3 = |name: &str| -> Result<[f32; 3], String> {
            let parts = attr(name)?
                .split_whitespace()
                .map(str::parse::<f32>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| format!("{} is not a vector", name))?;
            <[f32; 3]>::try_from(parts).map_err(|_| format!("{} needs three components", name))
        };

        Ok(Self {
            start_frame: seconds_to_frame(float("StartTime")?),
            end_frame: seconds_to_frame(float("EndTime")?),
            shape: attr("Shape")?.trim().parse().map_err(|_| "Shape is not an integer".to_string())?,
            offset: vec3("Offset")?,
            rotation: vec3("Rot")?,
            size: vec3("Size")?,
        })
    }
}

/// Extract attack intervals from a `SeqRoot` tree.
///
/// Any other root, or a missing `AttackTrack`, yields no intervals. A `Seq`
/// with unusable attributes is skipped and reported.
pub fn attack_intervals(root: &BxmNode) -> (Vec<AttackInterval>, DecodeReport) {
    let mut report = DecodeReport::new();
    if root.tag != "SeqRoot" {
        return (Vec::new(), report);
    }
    let Some(track) = root.find("AttackTrack") else {
        return (Vec::new(), report);
    };

    let mut intervals = Vec::new();
    for (i, seq) in track.find_all("Seq").enumerate() {
        match AttackInterval::from_node(seq) {
            Ok(interval) => intervals.push(interval),
            Err(message) => {
                warn!(seq = i, %message, "skipping attack sequence");
                report.skip(DiagnosticKind::CorruptRecord, format!("Seq {}", i), message);
            }
        }
    }
    (intervals, report)
}

/// Sibling path `<dir>/<stem>_<slot>_seq.bxm` for a MOT path
pub fn seq_sibling_path(mot_path: &Path, slot: usize) -> Option<PathBuf> {
    let stem = mot_path.file_stem()?.to_string_lossy();
    Some(mot_path.with_file_name(format!("{}_{}_seq.bxm", stem, slot)))
}

/// First existing sequence sibling, probing slots 0, 1, 2 in order
pub fn find_seq_sibling(mot_path: &Path) -> Option<PathBuf> {
    (0..SEQ_SIBLING_SLOTS)
        .filter_map(|slot| seq_sibling_path(mot_path, slot))
        .find(|path| path.is_file())
}

/// Load the attack intervals paired with `mot_path`.
///
/// Returns `ResourceNotFound` when no sibling exists or it vanished before
/// it could be read.
pub fn load_attack_intervals(mot_path: &Path) -> ParseResult<(PathBuf, Vec<AttackInterval>, DecodeReport)> {
    let path = find_seq_sibling(mot_path).ok_or_else(|| ParseError::ResourceNotFound {
        resource: format!("{}_*_seq.bxm", mot_path.with_extension("").display()),
    })?;
    let bytes = std::fs::read(&path).map_err(|_| ParseError::ResourceNotFound {
        resource: path.display().to_string(),
    })?;
    let document = BxmDocument::decode(&bytes).map_err(|e| e.with_context(path.display().to_string()))?;
    let (intervals, report) = attack_intervals(&document.root);
    debug!(path = %path.display(), intervals = intervals.len(), "attack sequences loaded");
    Ok((path, intervals, report))
}
