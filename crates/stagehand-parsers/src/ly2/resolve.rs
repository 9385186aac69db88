//! Prop resource resolution seam

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::PropCategory;

/// Where a prop's model was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum PropSource {
    /// `<name>.wmb` inside an already-extracted `<name>.dat` directory
    ExtractedWmb(PathBuf),
    /// `<category>/<name>.dtt` archive in the original layout
    ArchivedDtt(PathBuf),
}

impl PropSource {
    pub fn path(&self) -> &Path {
        match self {
            PropSource::ExtractedWmb(path) | PropSource::ArchivedDtt(path) => path,
        }
    }
}

/// Finds the resource for a prop name, or reports it missing with `None`
pub trait PropResolver {
    fn resolve(&self, name: &str, category: PropCategory) -> Option<PropSource>;
}

impl<F> PropResolver for F
where
    F: Fn(&str, PropCategory) -> Option<PropSource>,
{
    fn resolve(&self, name: &str, category: PropCategory) -> Option<PropSource> {
        self(name, category)
    }
}
