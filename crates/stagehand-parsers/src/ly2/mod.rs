//! LY2 (prop placement) codec
//!
//! An LY2 sits next to an SCR and places reusable props around the stage.
//!
//! ```text
//! header     "LY2\0", u32 flags, u32 prop type count, u32 trailer offset, u32 trailer count
//! prop type  u32 flags × 2, 2-char category, u16 id, u32 instances offset, u32 instances count
//! instance   3 × f32 position, 3 × f32 scale, 4 opaque, u8 yaw + 3 opaque, 8 opaque
//! trailer    trailer count × (u32, u32, u32)
//! ```
//!
//! Only categories `ba`, `bh` and `bm` are props; for any other category the
//! 10 bytes after the code are not interpreted.

mod resolve;

pub use resolve::{PropResolver, PropSource};

use std::fmt;

use byteorder::LittleEndian;
use serde::Serialize;
use stagehand_core::{DecodeReport, DiagnosticKind};
use tracing::{debug, warn};

use crate::cursor::{ByteReader, ByteWriter};
use crate::traits::{expect_magic, HumanReadable, ParseError, ParseOptions, ParseResult, Parser};
use crate::transform::{decode_ly2_rotation, Transform};

pub const LY2_MAGIC: &[u8; 4] = b"LY2\0";
pub const HEADER_SIZE: usize = 20;
pub const PROP_TYPE_SIZE: usize = 20;
pub const INSTANCE_SIZE: usize = 40;

/// Prop archive category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropCategory {
    Ba,
    Bh,
    Bm,
}

impl PropCategory {
    pub fn from_code(code: [u8; 2]) -> Option<Self> {
        match &code {
            b"ba" => Some(PropCategory::Ba),
            b"bh" => Some(PropCategory::Bh),
            b"bm" => Some(PropCategory::Bm),
            _ => None,
        }
    }

    pub fn code(&self) -> [u8; 2] {
        match self {
            PropCategory::Ba => *b"ba",
            PropCategory::Bh => *b"bh",
            PropCategory::Bm => *b"bm",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropCategory::Ba => "ba",
            PropCategory::Bh => "bh",
            PropCategory::Bm => "bm",
        }
    }
}

impl fmt::Display for PropCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource name of a prop, e.g. `ba` + `0x2f1` gives `ba02f1`
pub fn prop_name(category: PropCategory, id: u16) -> String {
    format!("{}{:04x}", category, id)
}

/// One placed instance, with its undecoded bytes kept for re-encoding
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ly2Instance {
    pub position: [f32; 3],
    pub scale: [f32; 3],
    /// Raw yaw; `raw * pi / 128` radians about the up axis
    pub rotation: u8,
    pub opaque_pre: [u8; 4],
    pub opaque_rotation: [u8; 3],
    pub opaque_post: [u8; 8],
}

impl Ly2Instance {
    pub fn new(position: [f32; 3], rotation: u8, scale: [f32; 3]) -> Self {
        Self {
            position,
            scale,
            rotation,
            opaque_pre: [0; 4],
            opaque_rotation: [0; 3],
            opaque_post: [0; 8],
        }
    }

    /// Placement transform; only the Y rotation is ever non-zero
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, [0.0, decode_ly2_rotation(self.rotation), 0.0], self.scale)
    }

    fn parse(r: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        let position = r.read_vec3()?;
        let scale = r.read_vec3()?;
        let opaque_pre = r.read_array::<4>()?;
        let [rotation, a, b, c] = r.read_array::<4>()?;
        let opaque_post = r.read_array::<8>()?;
        Ok(Self {
            position,
            scale,
            rotation,
            opaque_pre,
            opaque_rotation: [a, b, c],
            opaque_post,
        })
    }

    fn write(&self, w: &mut ByteWriter<LittleEndian>) {
        w.write_vec3(self.position);
        w.write_vec3(self.scale);
        w.write_bytes(&self.opaque_pre);
        w.write_u8(self.rotation);
        w.write_bytes(&self.opaque_rotation);
        w.write_bytes(&self.opaque_post);
    }
}

/// A prop type entry of a known category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropType {
    pub flags: [u32; 2],
    pub category: PropCategory,
    pub id: u16,
    pub instances: Vec<Ly2Instance>,
}

impl PropType {
    pub fn name(&self) -> String {
        prop_name(self.category, self.id)
    }
}

/// A prop type table entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Ly2Entry {
    Prop(PropType),
    /// Category outside the prop set; the rest of the entry is kept verbatim
    Unknown {
        flags: [u32; 2],
        code: [u8; 2],
        rest: [u8; 10],
    },
}

/// Every entry of an LY2, without resolving any resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ly2Document {
    pub flags: u32,
    pub entries: Vec<Ly2Entry>,
    /// Undocumented trailer records, carried through untouched
    pub trailer: Vec<[u32; 3]>,
}

struct RawHeader {
    flags: u32,
    prop_type_count: u32,
    trailer_offset: u32,
    trailer_count: u32,
}

fn read_header(r: &mut ByteReader<'_, LittleEndian>) -> ParseResult<RawHeader> {
    expect_magic("LY2", r.data(), LY2_MAGIC)?;
    r.seek(4)?;
    Ok(RawHeader {
        flags: r.read_u32()?,
        prop_type_count: r.read_u32()?,
        trailer_offset: r.read_u32()?,
        trailer_count: r.read_u32()?,
    })
}

fn read_trailer(r: &mut ByteReader<'_, LittleEndian>, header: &RawHeader) -> ParseResult<Vec<[u32; 3]>> {
    if header.trailer_count == 0 {
        return Ok(Vec::new());
    }
    r.with_position(header.trailer_offset as usize, |r| {
        let flat = r.read_u32s(header.trailer_count as usize * 3)?;
        Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
    })
    .map_err(|e| e.with_context("LY2 trailer"))
}

fn read_instances(r: &mut ByteReader<'_, LittleEndian>, offset: u32, count: u32) -> ParseResult<Vec<Ly2Instance>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    r.with_position(offset as usize, |r| (0..count).map(|_| Ly2Instance::parse(r)).collect())
}

/// Entry head: flags and the category code
fn read_entry_head(r: &mut ByteReader<'_, LittleEndian>) -> ParseResult<([u32; 2], [u8; 2])> {
    Ok(([r.read_u32()?, r.read_u32()?], r.read_array::<2>()?))
}

impl Ly2Document {
    /// Decode every entry, walking the instance table of each known prop
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        let mut r: ByteReader<'_, LittleEndian> = ByteReader::new(data);
        let header = read_header(&mut r)?;

        let mut entries = Vec::with_capacity((header.prop_type_count as usize).min(r.remaining() / PROP_TYPE_SIZE));
        for i in 0..header.prop_type_count {
            let (flags, code) = read_entry_head(&mut r)?;
            let entry = match PropCategory::from_code(code) {
                Some(category) => {
                    let id = r.read_u16()?;
                    let offset = r.read_u32()?;
                    let count = r.read_u32()?;
                    let instances = read_instances(&mut r, offset, count)
                        .map_err(|e| e.with_context(format!("prop type {}", i)))?;
                    Ly2Entry::Prop(PropType {
                        flags,
                        category,
                        id,
                        instances,
                    })
                }
                None => Ly2Entry::Unknown {
                    flags,
                    code,
                    rest: r.read_array::<10>()?,
                },
            };
            entries.push(entry);
        }

        let trailer = read_trailer(&mut r, &header)?;
        Ok(Self {
            flags: header.flags,
            entries,
            trailer,
        })
    }

    /// Known prop entries in table order
    pub fn props(&self) -> impl Iterator<Item = &PropType> {
        self.entries.iter().filter_map(|e| match e {
            Ly2Entry::Prop(prop) => Some(prop),
            Ly2Entry::Unknown { .. } => None,
        })
    }

    pub fn encode(&self) -> ParseResult<Vec<u8>> {
        let entries_offset = HEADER_SIZE;
        let mut instances_offset = entries_offset + self.entries.len() * PROP_TYPE_SIZE;
        let mut w: ByteWriter<LittleEndian> = ByteWriter::new();

        w.seek(entries_offset);
        let mut blocks = Vec::new();
        for entry in &self.entries {
            match entry {
                Ly2Entry::Prop(prop) => {
                    w.write_u32(prop.flags[0]);
                    w.write_u32(prop.flags[1]);
                    w.write_bytes(&prop.category.code());
                    w.write_u16(prop.id);
                    let offset = if prop.instances.is_empty() { 0 } else { instances_offset };
                    w.write_u32(to_u32(offset)?);
                    w.write_u32(to_u32(prop.instances.len())?);
                    blocks.push((offset, &prop.instances));
                    instances_offset += prop.instances.len() * INSTANCE_SIZE;
                }
                Ly2Entry::Unknown { flags, code, rest } => {
                    w.write_u32(flags[0]);
                    w.write_u32(flags[1]);
                    w.write_bytes(code);
                    w.write_bytes(rest);
                }
            }
        }
        for (offset, instances) in blocks {
            w.seek(offset);
            for instance in instances {
                instance.write(&mut w);
            }
        }

        let trailer_offset = if self.trailer.is_empty() { 0 } else { instances_offset };
        w.seek(instances_offset);
        for record in &self.trailer {
            for &value in record {
                w.write_u32(value);
            }
        }

        w.seek(0);
        w.write_bytes(LY2_MAGIC);
        w.write_u32(self.flags);
        w.write_u32(to_u32(self.entries.len())?);
        w.write_u32(to_u32(trailer_offset)?);
        w.write_u32(to_u32(self.trailer.len())?);
        Ok(w.into_inner())
    }
}

fn to_u32(value: usize) -> ParseResult<u32> {
    u32::try_from(value).map_err(|_| ParseError::InvalidStructure(format!("{} exceeds 32 bits", value)))
}

/// A prop instance to place in the scene
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropPlacement {
    pub prop_name: String,
    pub category: PropCategory,
    pub source: PropSource,
    pub instance_index: usize,
    pub transform: Transform,
}

/// A prop type whose resource was found
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedProp {
    pub name: String,
    pub category: PropCategory,
    pub flags: [u32; 2],
    pub source: PropSource,
    pub instance_count: usize,
}

/// Result of resolving an LY2 against the file layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ly2Layout {
    pub flags: u32,
    pub prop_types: Vec<ResolvedProp>,
    pub placements: Vec<PropPlacement>,
    pub trailer: Vec<[u32; 3]>,
    pub report: DecodeReport,
}

/// Decode an LY2 and place every resolvable prop.
///
/// Unknown categories and props the resolver cannot find are skipped and
/// reported; the instance table of a skipped prop is never read. A prop whose
/// instance table is unreadable is skipped too. Header or trailer damage
/// aborts.
pub fn decode_ly2(data: &[u8], resolver: &dyn PropResolver) -> ParseResult<Ly2Layout> {
    let mut r: ByteReader<'_, LittleEndian> = ByteReader::new(data);
    let header = read_header(&mut r)?;

    let mut report = DecodeReport::new();
    let mut prop_types = Vec::new();
    let mut placements = Vec::new();

    for i in 0..header.prop_type_count {
        let (flags, code) = read_entry_head(&mut r)?;
        let Some(category) = PropCategory::from_code(code) else {
            let shown = String::from_utf8_lossy(&code).into_owned();
            warn!(entry = i, category = %shown, "prop category not in the prop set, skipping");
            report.skip(
                DiagnosticKind::UnknownCategory,
                format!("prop type {}", i),
                format!("category '{}'", shown),
            );
            r.skip(10)?;
            continue;
        };

        let name = prop_name(category, r.read_u16()?);
        let Some(source) = resolver.resolve(&name, category) else {
            warn!(prop = %name, "could not find prop resource, skipping");
            report.skip(DiagnosticKind::ResourceNotFound, &name, "no extracted or archived resource");
            r.skip(8)?;
            continue;
        };

        let offset = r.read_u32()?;
        let count = r.read_u32()?;
        let instances = match read_instances(&mut r, offset, count) {
            Ok(instances) => instances,
            Err(e) => {
                warn!(prop = %name, error = %e, "instance table unreadable, skipping");
                report.skip(DiagnosticKind::CorruptRecord, &name, e.to_string());
                continue;
            }
        };

        for (index, instance) in instances.iter().enumerate() {
            placements.push(PropPlacement {
                prop_name: name.clone(),
                category,
                source: source.clone(),
                instance_index: index,
                transform: instance.transform(),
            });
        }
        prop_types.push(ResolvedProp {
            name,
            category,
            flags,
            source,
            instance_count: instances.len(),
        });
    }

    let trailer = read_trailer(&mut r, &header)?;
    debug!(
        props = prop_types.len(),
        placements = placements.len(),
        skipped = report.len(),
        "LY2 resolved"
    );
    Ok(Ly2Layout {
        flags: header.flags,
        prop_types,
        placements,
        trailer,
        report,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ly2Parser;

impl Ly2Parser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for Ly2Parser {
    type Output = Ly2Document;

    fn extensions(&self) -> &[&str] {
        &["ly2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(LY2_MAGIC)
    }

    fn name(&self) -> &str {
        "LY2 Prop Layout Parser"
    }

    fn parse_bytes(&self, data: &[u8], _options: &ParseOptions) -> ParseResult<Self::Output> {
        Ly2Document::decode(data)
    }
}

impl HumanReadable for Ly2Document {
    fn to_readable_string(&self) -> String {
        let mut out = format!(
            "LY2: flags {:#x}, {} entries, {} trailer records\n",
            self.flags,
            self.entries.len(),
            self.trailer.len()
        );
        for entry in &self.entries {
            match entry {
                Ly2Entry::Prop(prop) => {
                    out.push_str(&format!("  {} ({} instances)\n", prop.name(), prop.instances.len()))
                }
                Ly2Entry::Unknown { code, .. } => {
                    out.push_str(&format!("  [{}] not a prop\n", String::from_utf8_lossy(code)))
                }
            }
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "format": "LY2",
            "flags": self.flags,
            "props": self.props().map(|p| serde_json::json!({
                "name": p.name(),
                "flags": p.flags,
                "instances": p.instances.iter().map(|i| i.transform()).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "trailer": self.trailer,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::path::PathBuf;

    pub(crate) fn sample_document() -> Ly2Document {
        Ly2Document {
            flags: 0x11,
            entries: vec![
                Ly2Entry::Prop(PropType {
                    flags: [1, 2],
                    category: PropCategory::Ba,
                    id: 0x02f1,
                    instances: vec![
                        Ly2Instance::new([1.0, 0.0, 2.0], 128, [1.0; 3]),
                        Ly2Instance::new([3.0, 0.0, 4.0], 0, [2.0; 3]),
                    ],
                }),
                Ly2Entry::Unknown {
                    flags: [0, 0],
                    code: *b"xx",
                    rest: [0xAB; 10],
                },
                Ly2Entry::Prop(PropType {
                    flags: [0, 0],
                    category: PropCategory::Bm,
                    id: 0x0010,
                    instances: vec![Ly2Instance::new([0.0; 3], 64, [1.0; 3])],
                }),
            ],
            trailer: vec![[7, 8, 9]],
        }
    }

    #[test]
    fn test_document_roundtrip_is_lossless() {
        let doc = sample_document();
        let bytes = doc.encode().unwrap();
        assert_eq!(Ly2Document::decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_unknown_category_skipped_known_resolved() {
        let bytes = sample_document().encode().unwrap();
        let resolver = |name: &str, _: PropCategory| Some(PropSource::ExtractedWmb(PathBuf::from(format!("{}.wmb", name))));
        let layout = decode_ly2(&bytes, &resolver).unwrap();

        assert_eq!(layout.placements.len(), 3);
        assert_eq!(layout.report.count(DiagnosticKind::UnknownCategory), 1);
        assert_eq!(layout.prop_types[0].name, "ba02f1");
        assert_eq!(layout.prop_types[0].instance_count, 2);
        assert_eq!(layout.trailer, vec![[7, 8, 9]]);
        assert_eq!(layout.flags, 0x11);

        let first = &layout.placements[0].transform;
        assert!((first.rotation[1] - PI).abs() < 1e-6);
        assert_eq!(first.rotation[0], 0.0);
        assert_eq!(first.rotation[2], 0.0);
        assert_eq!(layout.placements[1].transform.rotation[1], 0.0);
    }

    #[test]
    fn test_unresolved_prop_is_not_walked() {
        // Point the unresolvable prop's instance table past the end of the file
        let mut bytes = sample_document().encode().unwrap();
        let third_entry = HEADER_SIZE + 2 * PROP_TYPE_SIZE;
        bytes[third_entry + 12..third_entry + 16].copy_from_slice(&0xFFFF_0000u32.to_le_bytes());

        let resolver = |name: &str, _: PropCategory| {
            (name == "ba02f1").then(|| PropSource::ArchivedDtt(PathBuf::from("ba/ba02f1.dtt")))
        };
        let layout = decode_ly2(&bytes, &resolver).unwrap();
        assert_eq!(layout.placements.len(), 2);
        assert_eq!(layout.report.count(DiagnosticKind::ResourceNotFound), 1);
        assert_eq!(layout.report.count(DiagnosticKind::CorruptRecord), 0);
    }

    #[test]
    fn test_bad_instance_table_skips_only_that_prop() {
        let mut bytes = sample_document().encode().unwrap();
        let first_entry = HEADER_SIZE;
        bytes[first_entry + 12..first_entry + 16].copy_from_slice(&0xFFFF_0000u32.to_le_bytes());
        let resolver = |_: &str, _: PropCategory| Some(PropSource::ExtractedWmb(PathBuf::from("p.wmb")));
        let layout = decode_ly2(&bytes, &resolver).unwrap();
        assert_eq!(layout.placements.len(), 1);
        assert_eq!(layout.report.count(DiagnosticKind::CorruptRecord), 1);
    }

    #[test]
    fn test_prop_names_are_lowercase_hex() {
        assert_eq!(prop_name(PropCategory::Bh, 0xABC), "bh0abc");
        assert_eq!(PropCategory::from_code(*b"bm"), Some(PropCategory::Bm));
        assert_eq!(PropCategory::from_code(*b"BA"), None);
    }

    #[test]
    fn test_wrong_magic() {
        let resolver = |_: &str, _: PropCategory| -> Option<PropSource> { None };
        let err = decode_ly2(b"LY3\0", &resolver).unwrap_err();
        assert!(err.is_format_error());
    }
}
