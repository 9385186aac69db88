//! DAT/DTT archive reader
//!
//! Props in the original layout ship as `.dtt` archives holding the model
//! together with its textures. Both extensions share one container layout:
//!
//! ```text
//! 0x00  "DAT\0", u32 file count
//! 0x08  u32 offsets of: file table, extension table, name table, size table, hash map
//! 0x1C  u32 padding
//! ....  file table       u32 × count, absolute data offsets
//! ....  extension table  4 bytes × count, NUL padded
//! ....  name table       u32 name length, then fixed-length names
//! ....  size table       u32 × count
//! ```
//!
//! The hash map speeds up lookups in the engine and is not read here.

use byteorder::LittleEndian;
use bytes::Bytes;
use serde::Serialize;
use stagehand_core::ByteRange;
use tracing::debug;

use crate::cursor::{align_to, ByteReader, ByteWriter};
use crate::traits::{expect_magic, HumanReadable, ParseError, ParseOptions, ParseResult, Parser, RandomAccessParser};

pub const DAT_MAGIC: &[u8; 4] = b"DAT\0";
pub const HEADER_SIZE: usize = 32;

/// One archived file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatEntry {
    pub name: String,
    pub extension: String,
    pub range: ByteRange,
    #[serde(skip)]
    pub data: Bytes,
}

impl DatEntry {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_string()).unwrap_or_default();
        Self {
            name,
            extension,
            range: ByteRange::new(0, 0),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatArchive {
    pub entries: Vec<DatEntry>,
}

impl DatArchive {
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        Self::decode_shared(Bytes::copy_from_slice(data))
    }

    pub fn decode_shared(data: Bytes) -> ParseResult<Self> {
        expect_magic("DAT", &data, DAT_MAGIC)?;
        let mut r: ByteReader<'_, LittleEndian> = ByteReader::new(&data);
        r.seek(4)?;
        let count = r.read_u32()? as usize;
        let files_offset = r.read_u32()? as usize;
        let extensions_offset = r.read_u32()? as usize;
        let names_offset = r.read_u32()? as usize;
        let sizes_offset = r.read_u32()? as usize;

        let offsets = r.with_position(files_offset, |r| r.read_u32s(count))?;
        let sizes = r.with_position(sizes_offset, |r| r.read_u32s(count))?;
        let extensions = r.with_position(extensions_offset, |r| {
            (0..count).map(|_| r.read_fixed_string(4)).collect::<ParseResult<Vec<_>>>()
        })?;
        let names = r.with_position(names_offset, |r| {
            let name_len = r.read_u32()? as usize;
            (0..count)
                .map(|_| r.read_fixed_string(name_len))
                .collect::<ParseResult<Vec<_>>>()
        })?;

        let mut entries = Vec::with_capacity(count);
        for (i, name) in names.into_iter().enumerate() {
            let range = ByteRange::from_len(offsets[i], sizes[i])
                .filter(|range| range.fits_within(data.len()))
                .ok_or_else(|| {
                    ParseError::corrupt(
                        u64::from(offsets[i]),
                        format!("entry '{}' ({} bytes) lies outside the archive", name, sizes[i]),
                    )
                })?;
            entries.push(DatEntry {
                name,
                extension: extensions[i].clone(),
                range,
                data: data.slice(range.as_usize_range()),
            });
        }

        debug!(entries = entries.len(), "DAT decoded");
        Ok(Self { entries })
    }

    pub fn find(&self, name: &str) -> Option<&DatEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// First entry with `extension` (without the dot), in archive order
    pub fn first_with_extension(&self, extension: &str) -> Option<&DatEntry> {
        self.entries.iter().find(|e| e.extension.eq_ignore_ascii_case(extension))
    }

    pub fn encode(&self) -> ParseResult<Vec<u8>> {
        let count = self.entries.len();
        let name_len = self.entries.iter().map(|e| e.name.len() + 1).max().unwrap_or(1);

        let files_offset = HEADER_SIZE;
        let extensions_offset = files_offset + count * 4;
        let names_offset = extensions_offset + count * 4;
        let sizes_offset = align_to(names_offset + 4 + count * name_len, 4);
        let mut data_offset = align_to(sizes_offset + count * 4, 16);

        let mut w: ByteWriter<LittleEndian> = ByteWriter::new();
        w.write_bytes(DAT_MAGIC);
        for value in [count, files_offset, extensions_offset, names_offset, sizes_offset, 0, 0] {
            w.write_u32(to_u32(value)?);
        }

        for (i, entry) in self.entries.iter().enumerate() {
            w.seek(files_offset + i * 4);
            w.write_u32(to_u32(data_offset)?);
            w.seek(extensions_offset + i * 4);
            w.write_fixed_string(&entry.extension, 4)?;
            w.seek(sizes_offset + i * 4);
            w.write_u32(to_u32(entry.data.len())?);
            w.seek(data_offset);
            w.write_bytes(&entry.data);
            data_offset = align_to(data_offset + entry.data.len(), 16);
        }

        w.seek(names_offset);
        w.write_u32(to_u32(name_len)?);
        for entry in &self.entries {
            w.write_fixed_string(&entry.name, name_len)?;
        }
        Ok(w.into_inner())
    }
}

fn to_u32(value: usize) -> ParseResult<u32> {
    u32::try_from(value).map_err(|_| ParseError::InvalidStructure(format!("{} exceeds 32 bits", value)))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DatParser;

impl DatParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for DatParser {
    type Output = DatArchive;

    fn extensions(&self) -> &[&str] {
        &["dat", "dtt"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(DAT_MAGIC)
    }

    fn name(&self) -> &str {
        "DAT/DTT Archive Parser"
    }

    fn parse_bytes(&self, data: &[u8], _options: &ParseOptions) -> ParseResult<Self::Output> {
        DatArchive::decode(data)
    }
}

impl RandomAccessParser for DatParser {
    type EntryId = String;
    type EntryMeta = ByteRange;

    fn list_entries(&self, data: &[u8]) -> ParseResult<Vec<(String, ByteRange)>> {
        Ok(DatArchive::decode(data)?
            .entries
            .into_iter()
            .map(|e| (e.name, e.range))
            .collect())
    }

    fn extract_entry(&self, data: &[u8], entry_id: &String) -> ParseResult<Vec<u8>> {
        let archive = DatArchive::decode(data)?;
        archive
            .find(entry_id)
            .map(|e| e.data.to_vec())
            .ok_or_else(|| ParseError::ResourceNotFound {
                resource: entry_id.clone(),
            })
    }
}

impl HumanReadable for DatArchive {
    fn to_readable_string(&self) -> String {
        let mut out = format!("DAT: {} files\n", self.entries.len());
        for entry in &self.entries {
            out.push_str(&format!("  {:<32} {:>10} bytes\n", entry.name, entry.data.len()));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "format": "DAT",
            "entries": self.entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DatArchive {
        DatArchive {
            entries: vec![
                DatEntry::new("ba02f1.wtp", vec![1u8; 20]),
                DatEntry::new("ba02f1.wmb", vec![2u8; 33]),
                DatEntry::new("ba02f1_lod.wmb", vec![3u8; 5]),
            ],
        }
    }

    #[test]
    fn test_encode_decode_entries() {
        let decoded = DatArchive::decode(&sample().encode().unwrap()).unwrap();
        assert_eq!(decoded.entries.len(), 3);
        assert_eq!(decoded.entries[1].name, "ba02f1.wmb");
        assert_eq!(decoded.entries[1].extension, "wmb");
        assert_eq!(&decoded.entries[1].data[..], &[2u8; 33]);
    }

    #[test]
    fn test_first_wmb_wins() {
        let decoded = DatArchive::decode(&sample().encode().unwrap()).unwrap();
        assert_eq!(decoded.first_with_extension("wmb").unwrap().name, "ba02f1.wmb");
        assert!(decoded.first_with_extension("mot").is_none());
    }

    #[test]
    fn test_entry_outside_archive_is_corrupt() {
        let mut bytes = sample().encode().unwrap();
        let sizes_offset = u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]) as usize;
        bytes[sizes_offset..sizes_offset + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = DatArchive::decode(&bytes).unwrap_err();
        assert_eq!(err.class(), crate::traits::ErrorClass::Corrupt);
    }

    #[test]
    fn test_extract_by_name() {
        let bytes = sample().encode().unwrap();
        let parser = DatParser::new();
        assert_eq!(parser.extract_entry(&bytes, &"ba02f1_lod.wmb".to_string()).unwrap(), vec![3u8; 5]);
        assert_eq!(parser.list_entries(&bytes).unwrap().len(), 3);
    }
}
