//! SCR (stage container) codec
//!
//! An SCR bundles the stage's WMB models. The header points at a table of
//! absolute model-header offsets; each 140-byte model header names the model,
//! places it, and points at its embedded WMB bytes.
//!
//! ```text
//! 0x00  "SCR\0", u16 unknown, u16 model count, u32 offset table
//! ....  u32 × model count            model header offsets
//! ....  u32 data offset, 64-byte name, 9 × f32 transform, 18 × i16 opaque
//! ```
//!
//! A model's bytes run from its data offset to the next model header in
//! file order, or to the end of the file for the last one.

use std::path::{Path, PathBuf};

use byteorder::LittleEndian;
use bytes::Bytes;
use serde::Serialize;
use stagehand_core::{ByteRange, DecodeReport, DiagnosticKind};
use tracing::{debug, warn};

use crate::cursor::{align_to, ByteReader, ByteWriter};
use crate::traits::{expect_magic, HumanReadable, ParseError, ParseOptions, ParseResult, Parser, RandomAccessParser};
use crate::transform::Transform;

pub const SCR_MAGIC: &[u8; 4] = b"SCR\0";
pub const HEADER_SIZE: usize = 12;
pub const MODEL_HEADER_SIZE: usize = 140;
pub const MODEL_NAME_SIZE: usize = 64;
pub const OPAQUE_SHORTS: usize = 18;

/// Byte extent of each entry given the entries' start offsets.
///
/// Each extent ends at the next larger offset, the file size acting as the
/// final sentinel. Input order is preserved in the output.
pub fn model_extents(offsets: &[u32], file_size: u32) -> Vec<ByteRange> {
    let mut sorted: Vec<u32> = offsets.to_vec();
    sorted.push(file_size);
    sorted.sort_unstable();

    offsets
        .iter()
        .map(|&start| {
            let next = sorted.partition_point(|&o| o <= start);
            let end = sorted.get(next).copied().unwrap_or(file_size).max(start);
            ByteRange::new(start, end)
        })
        .collect()
}

/// One embedded model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrModel {
    pub name: String,
    pub transform: Transform,
    /// Undocumented header shorts, carried through untouched
    pub opaque: [i16; OPAQUE_SHORTS],
    /// Where the model's WMB bytes live in the container
    pub range: ByteRange,
    #[serde(skip)]
    pub data: Bytes,
}

impl ScrModel {
    pub fn new(name: impl Into<String>, transform: Transform, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            transform,
            opaque: [0; OPAQUE_SHORTS],
            range: ByteRange::new(0, 0),
            data: data.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File name used when the model is written out
    pub fn file_name(&self) -> String {
        format!("{}.wmb", self.name)
    }
}

/// A decoded SCR container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrFile {
    pub unknown: u16,
    pub models: Vec<ScrModel>,
}

impl ScrFile {
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        Self::decode_shared(Bytes::copy_from_slice(data))
    }

    /// Decode without copying model bytes; each model's data is a slice of `data`
    pub fn decode_shared(data: Bytes) -> ParseResult<Self> {
        let mut reader: ByteReader<'_, LittleEndian> = ByteReader::new(&data);
        expect_magic("SCR", &data, SCR_MAGIC)?;
        reader.seek(4)?;
        let unknown = reader.read_u16()?;
        let model_count = reader.read_u16()?;
        let table_offset = reader.read_u32()?;

        let offsets = reader
            .with_position(table_offset as usize, |r| r.read_u32s(model_count as usize))
            .map_err(|e| e.with_context("model offset table"))?;
        let file_size = u32::try_from(data.len())
            .map_err(|_| ParseError::InvalidStructure("SCR larger than 4 GiB".into()))?;
        let extents = model_extents(&offsets, file_size);

        let mut models = Vec::with_capacity(offsets.len());
        for (i, (&offset, extent)) in offsets.iter().zip(&extents).enumerate() {
            let model = reader
                .with_position(offset as usize, |r| read_model_header(r, extent.end))
                .map_err(|e| e.with_context(format!("model header {}", i)))?;
            let data = data.slice(model.range.as_usize_range());
            models.push(ScrModel { data, ..model });
        }

        debug!(models = models.len(), "SCR decoded");
        Ok(Self { unknown, models })
    }

    /// Models with bytes to extract; empty ones are reported
    pub fn non_empty_models(&self) -> (Vec<&ScrModel>, DecodeReport) {
        let mut report = DecodeReport::new();
        let mut out = Vec::new();
        for model in &self.models {
            if model.is_empty() {
                warn!(model = %model.name, "SCR model has no data");
                report.skip(DiagnosticKind::EmptyEntry, &model.name, "model has no embedded bytes");
            } else {
                out.push(model);
            }
        }
        (out, report)
    }

    /// Build a container: header, offset table, then each model header followed by its data
    pub fn encode(&self) -> ParseResult<Vec<u8>> {
        let table_offset = align_to(HEADER_SIZE, 16);
        let mut cursor = align_to(table_offset + self.models.len() * 4, 16);
        let mut header_offsets = Vec::with_capacity(self.models.len());
        for model in &self.models {
            header_offsets.push(cursor);
            cursor = align_to(cursor + MODEL_HEADER_SIZE, 16) + model.data.len();
            cursor = align_to(cursor, 16);
        }

        let count = u16::try_from(self.models.len())
            .map_err(|_| ParseError::InvalidStructure("too many SCR models".into()))?;
        let mut w: ByteWriter<LittleEndian> = ByteWriter::with_capacity(cursor);
        w.write_bytes(SCR_MAGIC);
        w.write_u16(self.unknown);
        w.write_u16(count);
        w.write_u32(table_offset as u32);

        w.seek(table_offset);
        for &offset in &header_offsets {
            w.write_u32(to_u32(offset)?);
        }

        for (model, &offset) in self.models.iter().zip(&header_offsets) {
            let data_offset = align_to(offset + MODEL_HEADER_SIZE, 16);
            w.seek(offset);
            w.write_u32(to_u32(data_offset)?);
            w.write_fixed_string(&model.name, MODEL_NAME_SIZE)?;
            for value in model.transform.to_packed() {
                w.write_f32(value);
            }
            for value in model.opaque {
                w.write_i16(value);
            }
            w.seek(data_offset);
            w.write_bytes(&model.data);
        }
        Ok(w.into_inner())
    }
}

fn to_u32(value: usize) -> ParseResult<u32> {
    u32::try_from(value).map_err(|_| ParseError::InvalidStructure(format!("offset {} exceeds 32 bits", value)))
}

fn read_model_header(r: &mut ByteReader<'_, LittleEndian>, extent_end: u32) -> ParseResult<ScrModel> {
    let data_offset = r.read_u32()?;
    let name = r.read_fixed_string(MODEL_NAME_SIZE)?;
    let mut packed = [0.0f32; 9];
    for value in &mut packed {
        *value = r.read_f32()?;
    }
    let mut opaque = [0i16; OPAQUE_SHORTS];
    for value in &mut opaque {
        *value = r.read_i16()?;
    }

    // Data starting at or after the extent end leaves an empty model
    let range = if data_offset < extent_end {
        ByteRange::new(data_offset, extent_end)
    } else {
        ByteRange::new(extent_end, extent_end)
    };
    if !range.fits_within(r.len()) {
        return Err(ParseError::corrupt(
            u64::from(data_offset),
            format!("model '{}' data {} lies outside the file", name, range),
        ));
    }

    Ok(ScrModel {
        name,
        transform: Transform::from_packed(packed),
        opaque,
        range,
        data: Bytes::new(),
    })
}

/// Directory that extracted models are written to: `<scr dir>/<dir_name>`
pub fn extraction_dir(scr_path: &Path, dir_name: &str) -> PathBuf {
    scr_path.parent().unwrap_or_else(|| Path::new(".")).join(dir_name)
}

/// The LY2 paired with an SCR shares its stem
pub fn ly2_sibling_path(scr_path: &Path) -> PathBuf {
    scr_path.with_extension("ly2")
}

/// Summary of one container entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrEntryInfo {
    pub name: String,
    pub range: ByteRange,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScrParser;

impl ScrParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for ScrParser {
    type Output = ScrFile;

    fn extensions(&self) -> &[&str] {
        &["scr"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(SCR_MAGIC)
    }

    fn name(&self) -> &str {
        "SCR Stage Container Parser"
    }

    fn parse_bytes(&self, data: &[u8], _options: &ParseOptions) -> ParseResult<Self::Output> {
        ScrFile::decode(data)
    }
}

impl RandomAccessParser for ScrParser {
    type EntryId = usize;
    type EntryMeta = ScrEntryInfo;

    fn list_entries(&self, data: &[u8]) -> ParseResult<Vec<(usize, ScrEntryInfo)>> {
        let scr = ScrFile::decode(data)?;
        Ok(scr
            .models
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                (
                    i,
                    ScrEntryInfo {
                        name: m.name,
                        range: m.range,
                    },
                )
            })
            .collect())
    }

    fn extract_entry(&self, data: &[u8], entry_id: &usize) -> ParseResult<Vec<u8>> {
        let scr = ScrFile::decode(data)?;
        scr.models
            .get(*entry_id)
            .map(|m| m.data.to_vec())
            .ok_or_else(|| ParseError::ResourceNotFound {
                resource: format!("SCR entry {}", entry_id),
            })
    }
}

impl HumanReadable for ScrFile {
    fn to_readable_string(&self) -> String {
        let mut out = format!("SCR: {} models\n", self.models.len());
        for model in &self.models {
            let [x, y, z] = model.transform.position;
            out.push_str(&format!(
                "  {:<24} {:>10} bytes at {:#x}  pos ({:.2}, {:.2}, {:.2})\n",
                model.name,
                model.data.len(),
                model.range.start,
                x,
                y,
                z
            ));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "format": "SCR",
            "unknown": self.unknown,
            "models": self.models.iter().map(|m| serde_json::json!({
                "name": m.name,
                "size": m.data.len(),
                "range": m.range,
                "transform": m.transform,
                "opaque": m.opaque,
            })).collect::<Vec<_>>(),
        })
    }
}
