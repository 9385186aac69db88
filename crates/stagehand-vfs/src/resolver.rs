//! Prop resolution over the stage file layout
//!
//! Props referenced from `<stage>/<scr dir>/<name>.ly2` live in one of two
//! places, tried in this order:
//!
//! 1. `<scr dir>/../<prop>.dat/<prop>.wmb`, a DAT already extracted next to the stage
//! 2. `<scr dir>/../../../<category>/<prop>.dtt`, the archive in the game layout

use std::path::{Path, PathBuf};

use stagehand_parsers::ly2::{PropCategory, PropResolver, PropSource};
use tracing::{debug, trace};

use crate::mount::FilesystemMount;

pub struct FsPropResolver {
    extracted: Option<FilesystemMount>,
    archive: Option<FilesystemMount>,
}

fn mount_root(name: &str, root: PathBuf) -> Option<FilesystemMount> {
    FilesystemMount::new(name, &root)
        .map_err(|err| debug!(root = %root.display(), error = %err, "prop root not mounted"))
        .ok()
}

impl FsPropResolver {
    /// Resolver for the stage whose SCR lives in `scr_dir`.
    ///
    /// Roots that do not exist are left unmounted; their props simply never resolve.
    pub fn for_scr_dir(scr_dir: &Path) -> Self {
        Self {
            extracted: mount_root("extracted", scr_dir.join("..")),
            archive: mount_root("archive", scr_dir.join("..").join("..").join("..")),
        }
    }

    /// Resolver for the SCR file at `scr_path`
    pub fn for_scr(scr_path: &Path) -> Self {
        Self::for_scr_dir(scr_path.parent().unwrap_or_else(|| Path::new(".")))
    }

    pub fn mount_count(&self) -> usize {
        usize::from(self.extracted.is_some()) + usize::from(self.archive.is_some())
    }

    fn extracted(&self, name: &str) -> Option<PathBuf> {
        let mount = self.extracted.as_ref()?;
        let dir = format!("/{}.dat", name);
        if !mount.exists(&dir) {
            return None;
        }
        // The directory decides the branch; a missing WMB inside it surfaces at load time.
        mount.local_path(&dir).map(|dir| dir.join(format!("{}.wmb", name)))
    }

    fn archived(&self, name: &str, category: PropCategory) -> Option<PathBuf> {
        self.archive.as_ref()?.local_path(&format!("/{}/{}.dtt", category, name))
    }
}

impl PropResolver for FsPropResolver {
    fn resolve(&self, name: &str, category: PropCategory) -> Option<PropSource> {
        let source = self
            .extracted(name)
            .map(PropSource::ExtractedWmb)
            .or_else(|| self.archived(name, category).map(PropSource::ArchivedDtt));
        trace!(prop = name, ?source, "prop resolution");
        source
    }
}
