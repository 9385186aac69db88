//! Unified error handling for stagehand
//!
//! This module provides the error type shared by the VFS, scene and CLI
//! layers. Codec errors from `stagehand-parsers` convert into it without
//! losing their classification.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all stagehand operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // ==================== Format Errors ====================

    /// Invalid magic bytes at file start
    #[error("Invalid magic bytes: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        expected: Vec<u8>,
        found: Vec<u8>,
    },

    /// Structurally impossible header or stream
    #[error("Invalid data: {message}")]
    InvalidData {
        message: String,
    },

    /// Stream shorter than a declared field or table requires
    #[error("Unexpected end of file at offset {offset}")]
    UnexpectedEof {
        offset: u64,
    },

    /// In-range read succeeded but the referenced index or offset is invalid
    #[error("Corrupt data at offset {offset}: {message}")]
    CorruptData {
        offset: u64,
        message: String,
    },

    // ==================== Resource Errors ====================

    /// An externally referenced sibling resource is absent
    #[error("Resource not found: {resource}")]
    ResourceNotFound {
        resource: String,
    },

    /// No mount point could serve the path
    #[error("No mount point for path: {0}")]
    VfsNoMount(PathBuf),

    // ==================== Export Errors ====================

    /// Export failed
    #[error("Export failed: {message}")]
    ExportFailed {
        message: String,
    },

    // ==================== Configuration Errors ====================

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    // ==================== General Errors ====================

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// Multiple errors occurred
    #[error("Multiple errors occurred: {0:?}")]
    Multiple(Vec<Error>),

    /// External error (from other crates)
    #[error("{0}")]
    External(String),
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    /// Create a resource-not-found error
    pub fn resource_not_found(resource: impl Into<String>) -> Self {
        Error::ResourceNotFound {
            resource: resource.into(),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Error::FileNotFound(_) | Error::ResourceNotFound { .. } | Error::VfsNoMount(_)
        )
    }

    /// Check if this is a parse/format error
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self.root(),
            Error::InvalidMagic { .. }
                | Error::InvalidData { .. }
                | Error::UnexpectedEof { .. }
                | Error::CorruptData { .. }
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
