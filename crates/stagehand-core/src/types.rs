//! Common types used across stagehand
//!
//! This module provides shared type definitions used by multiple crates.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` inside a single byte store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u32,
    pub end: u32,
}

impl ByteRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Range of `len` bytes starting at `start`, `None` if it would overflow
    pub fn from_len(start: u32, len: u32) -> Option<Self> {
        start.checked_add(len).map(|end| Self { start, end })
    }

    /// Number of bytes covered; zero for inverted ranges
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that the range lies within a store of `size` bytes
    pub fn fits_within(&self, size: usize) -> bool {
        self.start <= self.end && (self.end as usize) <= size
    }

    pub fn as_usize_range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}..0x{:08X}", self.start, self.end)
    }
}

/// Why an entry was skipped or flagged during decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Record category or type not understood by this decoder
    UnknownCategory,
    /// A referenced index or offset was invalid for this record
    CorruptRecord,
    /// A bone index could not be mapped onto the target skeleton
    UnresolvedBone,
    /// An external sibling resource was absent or unreadable
    ResourceNotFound,
    /// An embedded blob had no bytes to extract
    EmptyEntry,
    /// Informational note that does not drop data
    Note,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::UnknownCategory => "unknown-category",
            DiagnosticKind::CorruptRecord => "corrupt-record",
            DiagnosticKind::UnresolvedBone => "unresolved-bone",
            DiagnosticKind::ResourceNotFound => "resource-not-found",
            DiagnosticKind::EmptyEntry => "empty-entry",
            DiagnosticKind::Note => "note",
        };
        f.write_str(label)
    }
}

/// A per-entry anomaly recorded instead of failing the whole decode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Entry the diagnostic refers to (record index, prop name, file name)
    pub entry: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, entry: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            entry: entry.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.entry, self.message)
    }
}

/// Diagnostics gathered while decoding one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl DecodeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record a skipped entry
    pub fn skip(&mut self, kind: DiagnosticKind, entry: impl Into<String>, message: impl Into<String>) {
        self.push(Diagnostic::new(kind, entry, message));
    }

    pub fn merge(&mut self, other: DecodeReport) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }
}

/// Outcome of decoding one independent entry
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome<T> {
    /// Entry decoded
    Ok(T),
    /// Entry deliberately skipped, with the reason
    Skip(Diagnostic),
}

impl<T> EntryOutcome<T> {
    /// Push skipped entries into `report`, yielding decoded values
    pub fn collect_into(self, report: &mut DecodeReport) -> Option<T> {
        match self {
            EntryOutcome::Ok(value) => Some(value),
            EntryOutcome::Skip(diagnostic) => {
                report.push(diagnostic);
                None
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, EntryOutcome::Ok(_))
    }
}

/// How a stage container is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImportMode {
    /// Write embedded models to disk; only the LY2 props reach the scene
    ExtractOnly,
    /// Write embedded models to disk, then decode them into the scene too
    #[default]
    ExtractAndImport,
}

impl ImportMode {
    /// Whether embedded models are decoded into the scene
    pub fn imports(&self) -> bool {
        matches!(self, ImportMode::ExtractAndImport)
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::ExtractOnly => f.write_str("extract-only"),
            ImportMode::ExtractAndImport => f.write_str("extract-and-import"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_len_and_bounds() {
        let range = ByteRange::new(100, 500);
        assert_eq!(range.len(), 400);
        assert!(range.fits_within(500));
        assert!(!range.fits_within(499));
        assert_eq!(range.as_usize_range(), 100..500);
    }

    #[test]
    fn test_byte_range_from_len_overflow() {
        assert!(ByteRange::from_len(u32::MAX, 2).is_none());
        assert_eq!(ByteRange::from_len(4, 8), Some(ByteRange::new(4, 12)));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = ByteRange::new(900, 100);
        assert!(range.is_empty());
        assert!(!range.fits_within(1000));
    }

    #[test]
    fn test_entry_outcome_collects_skips() {
        let mut report = DecodeReport::new();
        let kept = EntryOutcome::Ok(7).collect_into(&mut report);
        let skipped: Option<i32> = EntryOutcome::Skip(Diagnostic::new(
            DiagnosticKind::UnknownCategory,
            "xx0001",
            "category not handled",
        ))
        .collect_into(&mut report);

        assert_eq!(kept, Some(7));
        assert_eq!(skipped, None);
        assert_eq!(report.count(DiagnosticKind::UnknownCategory), 1);
    }

    #[test]
    fn test_import_mode_default_imports() {
        assert!(ImportMode::default().imports());
        assert!(!ImportMode::ExtractOnly.imports());
    }
}
