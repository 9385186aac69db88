//! WMB (model geometry) codec
//!
//! A WMB4 container is a fixed header followed by offset-addressed tables.
//! Every offset is absolute into the same buffer.
//!
//! # Format Structure
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (112 bytes)                           │
//! │  - "WMB4", version, vertex format, flags     │
//! │  - bounding box, (offset, count) tables      │
//! ├──────────────────────────────────────────────┤
//! │ Vertex groups (28 bytes each)                │
//! │ Batches (20 bytes each)                      │
//! │ Batch description, bones, bone sets          │
//! │ Materials, textures                          │
//! │ Meshes (68 bytes each) + names + index lists │
//! ├──────────────────────────────────────────────┤
//! │ Vertex buffers (12 or 32 byte stride)        │
//! │ Index buffers (u16)                          │
//! └──────────────────────────────────────────────┘
//! ```

mod header;
mod records;
mod writer;

pub use header::{OffsetTables, Span, WmbHeader, HEADER_SIZE};
pub use records::{
    Batch, BatchData, BatchDescription, BatchList, Bone, Material, Mesh, Texture, Vertex, VertexGroup,
};

use byteorder::LittleEndian;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cursor::ByteReader;
use crate::traits::{HumanReadable, ParseError, ParseOptions, ParseResult, Parser};
use crate::transform::remap_position;

use records::check_index;

/// WMB magic tag; any other value is a hard format mismatch
pub const WMB_MAGIC: &[u8; 4] = b"WMB4";

/// Vertex format code whose vertices carry a 20-byte payload after the position
pub const EXTENDED_VERTEX_FORMAT: u32 = 65847;

pub const BASE_VERTEX_STRIDE: usize = 12;
pub const EXTENDED_VERTEX_STRIDE: usize = 32;

/// A decoded WMB container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WmbModel {
    pub header: WmbHeader,
    pub vertex_groups: Vec<VertexGroup>,
    pub batches: Vec<Batch>,
    pub batch_description: BatchDescription,
    pub bones: Vec<Bone>,
    /// Opaque bone-index translate table
    pub bone_index_translate_table: Vec<u8>,
    pub bone_sets: Vec<Vec<u8>>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub meshes: Vec<Mesh>,
}

/// One batch of one mesh, ready for a scene
///
/// Positions are already in target axis order (X, Z, Y).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubMesh {
    /// `<mesh index>-<mesh name>-<batch slot>`
    pub name: String,
    pub mesh_name: String,
    pub mesh_index: usize,
    pub batch_index: usize,
    pub vertex_group_index: usize,
    pub material_index: Option<u16>,
    pub positions: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl SubMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl WmbModel {
    /// Decode a WMB container from a byte slice
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        let mut reader: ByteReader<'_, LittleEndian> = ByteReader::new(data);
        let header = WmbHeader::parse(&mut reader)?;
        let tables = header.tables;
        let stride = header.vertex_stride();
        let extended = header.is_extended_format();

        debug!(
            vertex_format = header.vertex_format,
            vertex_groups = tables.vertex_groups.count,
            batches = tables.batches.count,
            meshes = tables.meshes.count,
            "WMB header decoded"
        );

        let vertex_groups = read_table(&mut reader, tables.vertex_groups, "vertex group", |r| {
            VertexGroup::parse(r, stride, extended)
        })?;
        let batches = read_table(&mut reader, tables.batches, "batch", Batch::parse)?;
        let batch_description = if tables.batch_description == 0 {
            BatchDescription::default()
        } else {
            BatchDescription::parse(&mut reader, tables.batch_description)
                .map_err(|e| e.with_context("batch description"))?
        };
        let bones = read_table(&mut reader, tables.bones, "bone", Bone::parse)?;
        let bone_index_translate_table = if tables.bone_index_translate_table.is_empty() {
            Vec::new()
        } else {
            let span = tables.bone_index_translate_table;
            reader.with_position(span.offset as usize, |r| Ok(r.read_bytes(span.count as usize)?.to_vec()))?
        };
        let bone_sets = read_table(&mut reader, tables.bone_sets, "bone set", records::parse_bone_set)?;
        let materials = read_table(&mut reader, tables.materials, "material", Material::parse)?;
        let textures = read_table(&mut reader, tables.textures, "texture", Texture::parse)?;
        let meshes = read_table(&mut reader, tables.meshes, "mesh", Mesh::parse)?;

        Ok(Self {
            header,
            vertex_groups,
            batches,
            batch_description,
            bones,
            bone_index_translate_table,
            bone_sets,
            materials,
            textures,
            meshes,
        })
    }

    /// Resolve every mesh batch into an independent submesh.
    ///
    /// Batches are never merged: a mesh with N batches yields N submeshes.
    pub fn submeshes(&self, options: &ParseOptions) -> ParseResult<Vec<SubMesh>> {
        let mut out = Vec::new();
        for (mesh_index, mesh) in self.meshes.iter().enumerate() {
            for (slot, &batch_index) in mesh.batches.iter().enumerate() {
                let submesh = self
                    .resolve_batch(mesh_index, mesh, slot, batch_index as usize, options)
                    .map_err(|e| e.with_context(format!("mesh {} '{}'", mesh_index, mesh.name)))?;
                out.push(submesh);
            }
        }
        Ok(out)
    }

    fn resolve_batch(
        &self,
        mesh_index: usize,
        mesh: &Mesh,
        slot: usize,
        batch_index: usize,
        options: &ParseOptions,
    ) -> ParseResult<SubMesh> {
        let owner = format!("mesh {}", mesh_index);
        check_index(batch_index, self.batches.len(), "batch", &owner)?;
        let batch = &self.batches[batch_index];

        let group_index = batch.vertex_group_index as usize;
        check_index(group_index, self.vertex_groups.len(), "vertex group", &format!("batch {}", batch_index))?;
        let group = &self.vertex_groups[group_index];

        let vertices = sub_range(&group.vertices, batch.vertex_start, batch.vertex_count, "vertex", batch_index)?;
        let indices = sub_range(&group.indices, batch.index_start, batch.index_count, "index", batch_index)?;

        let whole = indices.len() / 3 * 3;
        if whole != indices.len() {
            if options.strict_validation {
                return Err(ParseError::corrupt(
                    0,
                    format!("batch {} has {} indices, not a multiple of 3", batch_index, indices.len()),
                ));
            }
            warn!(batch = batch_index, indices = indices.len(), "dropping trailing partial triangle");
        }

        let vertex_count = vertices.len();
        let mut triangles = Vec::with_capacity(whole / 3);
        for tri in indices[..whole].chunks_exact(3) {
            let face = [u32::from(tri[0]), u32::from(tri[1]), u32::from(tri[2])];
            if let Some(&bad) = face.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(ParseError::corrupt(
                    0,
                    format!(
                        "batch {} index {} out of range for {} vertices",
                        batch_index, bad, vertex_count
                    ),
                ));
            }
            triangles.push(face);
        }

        Ok(SubMesh {
            name: format!("{}-{}-{}", mesh_index, mesh.name, slot),
            mesh_name: mesh.name.clone(),
            mesh_index,
            batch_index,
            vertex_group_index: group_index,
            material_index: self
                .batch_description
                .material_for_batch(batch_index)
                .or_else(|| mesh.materials.first().copied()),
            positions: vertices.iter().map(|v| remap_position(v.position)).collect(),
            triangles,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_groups.iter().map(|g| g.vertices.len()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.vertex_groups.iter().map(|g| g.indices.len()).sum()
    }

    pub fn is_skinned(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Encode back to bytes; see [`writer`] for the layout
    pub fn encode(&self) -> ParseResult<Vec<u8>> {
        writer::encode(self)
    }
}

/// Read `span.count` fixed-size records at `span.offset`, leaving the cursor untouched
fn read_table<T>(
    reader: &mut ByteReader<'_, LittleEndian>,
    span: Span,
    what: &str,
    mut parse: impl FnMut(&mut ByteReader<'_, LittleEndian>) -> ParseResult<T>,
) -> ParseResult<Vec<T>> {
    if span.is_empty() {
        return Ok(Vec::new());
    }
    reader
        .with_position(span.offset as usize, |r| {
            let mut items = Vec::new();
            for _ in 0..span.count {
                items.push(parse(r)?);
            }
            Ok(items)
        })
        .map_err(|e| e.with_context(format!("{} table", what)))
}

fn sub_range<'a, T>(items: &'a [T], start: u32, count: u32, what: &str, batch: usize) -> ParseResult<&'a [T]> {
    let start = start as usize;
    let end = start.checked_add(count as usize).unwrap_or(usize::MAX);
    items.get(start..end).ok_or_else(|| {
        ParseError::corrupt(
            0,
            format!(
                "batch {} {} range {}..{} exceeds vertex group ({} entries)",
                batch,
                what,
                start,
                end,
                items.len()
            ),
        )
    })
}

/// WMB parser for registry and path-based use
#[derive(Debug, Default, Clone, Copy)]
pub struct WmbParser;

impl WmbParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for WmbParser {
    type Output = WmbModel;

    fn extensions(&self) -> &[&str] {
        &["wmb"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(WMB_MAGIC)
    }

    fn name(&self) -> &str {
        "WMB Model Parser"
    }

    fn parse_bytes(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output> {
        let model = WmbModel::decode(data)?;
        if options.strict_validation {
            // Surface reference errors at decode time rather than on first use
            model.submeshes(options)?;
        }
        Ok(model)
    }
}

impl HumanReadable for WmbModel {
    fn to_readable_string(&self) -> String {
        let mut out = format!(
            "WMB4 v{:#x}, vertex format {} ({}-byte stride)\n",
            self.header.version,
            self.header.vertex_format,
            self.header.vertex_stride()
        );
        out.push_str(&format!(
            "  {} vertex groups ({} vertices, {} indices)\n",
            self.vertex_groups.len(),
            self.vertex_count(),
            self.index_count()
        ));
        out.push_str(&format!(
            "  {} batches, {} bones, {} materials, {} textures\n",
            self.batches.len(),
            self.bones.len(),
            self.materials.len(),
            self.textures.len()
        ));
        for (i, mesh) in self.meshes.iter().enumerate() {
            out.push_str(&format!("  mesh {}: {} ({} batches)\n", i, mesh.name, mesh.batches.len()));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "format": "WMB4",
            "version": self.header.version,
            "vertex_format": self.header.vertex_format,
            "vertex_groups": self.vertex_groups.len(),
            "vertices": self.vertex_count(),
            "indices": self.index_count(),
            "batches": self.batches.len(),
            "bones": self.bones.len(),
            "materials": self.materials.iter().map(|m| &m.shader_name).collect::<Vec<_>>(),
            "meshes": self.meshes.iter().map(|m| serde_json::json!({
                "name": m.name,
                "batches": m.batches.as_slice(),
            })).collect::<Vec<_>>(),
        })
    }
}
