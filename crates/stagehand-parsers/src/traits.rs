// stagehand-parsers/src/traits.rs
//! Core traits defining the parser interface for all file formats.
//!
//! This module establishes a unified parsing interface that enables:
//! - Dynamic parser registration and discovery
//! - Consistent error handling across all formats
//! - Memory-mapped file support for large stage containers

use std::io::{Read, Seek};
use std::path::Path;

use thiserror::Error;

/// Errors that can occur during parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {format} magic bytes: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        format: &'static str,
        expected: Vec<u8>,
        found: Vec<u8>,
    },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Truncated input at offset {offset}: requested {requested} bytes, available {available}")]
    Truncated {
        offset: u64,
        requested: usize,
        available: usize,
    },

    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData { offset: u64, message: String },

    #[error("Resource not found: {resource}")]
    ResourceNotFound { resource: String },

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

/// Coarse error taxonomy shared by every codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Wrong magic or structurally impossible header; terminal
    Format,
    /// Stream shorter than a declared field or table; terminal
    Truncated,
    /// Semantically invalid reference; terminal for the record
    Corrupt,
    /// External sibling resource absent; recoverable
    ResourceNotFound,
    /// Underlying I/O failure
    Io,
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a corrupted-data error
    pub fn corrupt(offset: u64, message: impl Into<String>) -> Self {
        ParseError::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Classify the error, looking through context wrappers
    pub fn class(&self) -> ErrorClass {
        match self {
            ParseError::Io(_) => ErrorClass::Io,
            ParseError::InvalidMagic { .. } | ParseError::InvalidStructure(_) => ErrorClass::Format,
            ParseError::Truncated { .. } => ErrorClass::Truncated,
            ParseError::CorruptedData { .. } => ErrorClass::Corrupt,
            ParseError::ResourceNotFound { .. } => ErrorClass::ResourceNotFound,
            ParseError::Nested { source, .. } => source.class(),
        }
    }

    pub fn is_format_error(&self) -> bool {
        self.class() == ErrorClass::Format
    }
}

impl From<ParseError> for stagehand_core::Error {
    fn from(err: ParseError) -> Self {
        use stagehand_core::Error;

        match err {
            ParseError::Io(e) => Error::Io(e),
            ParseError::InvalidMagic { expected, found, .. } => Error::InvalidMagic { expected, found },
            ParseError::InvalidStructure(message) => Error::InvalidData { message },
            ParseError::Truncated { offset, .. } => Error::UnexpectedEof { offset },
            ParseError::CorruptedData { offset, message } => Error::CorruptData { offset, message },
            ParseError::ResourceNotFound { resource } => Error::ResourceNotFound { resource },
            ParseError::Nested { context, source } => Error::from(*source).with_context(context),
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Check that `data` starts with `magic`, before any offset is dereferenced
pub fn expect_magic(format: &'static str, data: &[u8], magic: &[u8]) -> ParseResult<()> {
    let found = &data[..data.len().min(magic.len())];
    if found != magic {
        return Err(ParseError::InvalidMagic {
            format,
            expected: magic.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}

/// Configuration options for parsing
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Whether to treat lenient repairs (e.g. a trailing partial triangle) as corruption
    pub strict_validation: bool,
    /// Maximum nesting depth for recursive structures
    pub max_nesting_depth: u32,
    /// Whether to use memory mapping for large files
    pub use_memory_mapping: bool,
    /// Minimum file size to enable memory mapping
    pub memory_mapping_threshold: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict_validation: false,
            max_nesting_depth: 32,
            use_memory_mapping: true,
            memory_mapping_threshold: 16 * 1024 * 1024, // 16 MB
        }
    }
}

/// Core trait for all file format parsers
///
/// Every codec decodes from an in-memory byte slice; the reader and path
/// entry points only acquire the bytes.
pub trait Parser: Send + Sync {
    /// The parsed output type
    type Output: Send + Sync;

    /// Returns the file extensions this parser handles (e.g., ["wmb"])
    fn extensions(&self) -> &[&str];

    /// Returns the magic bytes that identify this file type (if applicable)
    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    /// Returns a human-readable name for this parser
    fn name(&self) -> &str;

    /// Parse a complete in-memory buffer
    fn parse_bytes(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output>;

    /// Parse from a reader with default options
    fn parse<R: Read + Seek>(&self, reader: R) -> ParseResult<Self::Output> {
        self.parse_with_options(reader, &ParseOptions::default())
    }

    /// Parse from a reader with custom options
    fn parse_with_options<R: Read + Seek>(
        &self,
        mut reader: R,
        options: &ParseOptions,
    ) -> ParseResult<Self::Output> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.parse_bytes(&data, options)
    }

    /// Parse from a file path
    fn parse_file(&self, path: &Path) -> ParseResult<Self::Output> {
        self.parse_file_with_options(path, &ParseOptions::default())
    }

    /// Parse from a file path with options
    ///
    /// The file handle is scoped to this call and released on every exit path.
    fn parse_file_with_options(&self, path: &Path, options: &ParseOptions) -> ParseResult<Self::Output> {
        let file = std::fs::File::open(path)?;

        if options.use_memory_mapping {
            let metadata = file.metadata()?;
            if metadata.len() >= options.memory_mapping_threshold {
                // SAFETY: the mapping is read-only and dropped before returning
                #[allow(unsafe_code)]
                let map = unsafe { memmap2::Mmap::map(&file)? };
                return self.parse_bytes(&map, options);
            }
        }

        let reader = std::io::BufReader::new(file);
        self.parse_with_options(reader, options)
    }

    /// Check if this parser can handle the given file
    fn can_parse(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();
            if self.extensions().iter().any(|e| e.to_lowercase() == ext_str) {
                return true;
            }
        }

        if let Some(magic) = self.magic_bytes() {
            if let Ok(file) = std::fs::File::open(path) {
                let mut reader = std::io::BufReader::new(file);
                let mut buffer = vec![0u8; magic.len()];
                if reader.read_exact(&mut buffer).is_ok() {
                    return buffer == magic;
                }
            }
        }

        false
    }
}

/// Trait for containers whose entries can be listed and pulled out individually
pub trait RandomAccessParser: Parser {
    /// Entry identifier type
    type EntryId: Clone + Send;

    /// Entry metadata type
    type EntryMeta: Send;

    /// List all entries in the container
    fn list_entries(&self, data: &[u8]) -> ParseResult<Vec<(Self::EntryId, Self::EntryMeta)>>;

    /// Extract a single entry by ID
    fn extract_entry(&self, data: &[u8], entry_id: &Self::EntryId) -> ParseResult<Vec<u8>>;
}

/// Trait for parsers that produce hierarchical/tree structures
pub trait HierarchicalParser: Parser {
    /// Node type in the hierarchy
    type Node: Send;

    /// Get the root node of the parsed structure
    fn root<'a>(&self, parsed: &'a Self::Output) -> &'a Self::Node;

    /// Get children of a node
    fn children<'a>(&self, node: &'a Self::Node) -> Vec<&'a Self::Node>;

    /// Check if a node is a leaf (no children)
    fn is_leaf(&self, node: &Self::Node) -> bool {
        self.children(node).is_empty()
    }
}

/// Trait for converting parsed data to human-readable formats
pub trait HumanReadable {
    /// Convert to a human-readable string representation
    fn to_readable_string(&self) -> String;

    /// Convert to formatted JSON
    fn to_json(&self) -> serde_json::Value;

    /// Convert to formatted YAML (optional, returns JSON by default)
    fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.to_json()).unwrap_or_else(|_| self.to_readable_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_context() {
        let error = ParseError::InvalidMagic {
            format: "WMB",
            expected: b"WMB4".to_vec(),
            found: vec![0x00, 0x00, 0x00, 0x00],
        };

        let contextualized = error.with_context("parsing header");

        match &contextualized {
            ParseError::Nested { context, .. } => {
                assert_eq!(context, "parsing header");
            }
            _ => panic!("Expected Nested error"),
        }
        assert_eq!(contextualized.class(), ErrorClass::Format);
    }

    #[test]
    fn test_expect_magic_short_input() {
        let err = expect_magic("SCR", b"SC", b"SCR\0").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_conversion_keeps_taxonomy() {
        let err: stagehand_core::Error = ParseError::Truncated {
            offset: 12,
            requested: 4,
            available: 0,
        }
        .into();
        assert!(err.is_parse_error());

        let err: stagehand_core::Error = ParseError::ResourceNotFound {
            resource: "r010_0_seq.bxm".into(),
        }
        .with_context("sequence")
        .into();
        assert!(err.is_not_found());
    }
}
