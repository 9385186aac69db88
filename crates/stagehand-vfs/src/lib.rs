//! stagehand file layout
//!
//! Stage assets are spread over a multi-root layout (extracted DATs next to
//! the stage, DTT archives further up the game tree). This crate answers
//! "where does this prop live" so the codecs never touch the filesystem.
//!
//! # Example
//! ```no_run
//! use std::path::Path;
//! use stagehand_parsers::ly2::{PropCategory, PropResolver};
//! use stagehand_vfs::FsPropResolver;
//!
//! let resolver = FsPropResolver::for_scr(Path::new("data/st1/r100/r100.scr"));
//! if let Some(source) = resolver.resolve("ba02f1", PropCategory::Ba) {
//!     println!("found at {}", source.path().display());
//! }
//! ```

pub mod mount;
pub mod path;
pub mod resolver;

pub use mount::{FilesystemMount, MountError, MountResult};
pub use resolver::FsPropResolver;
