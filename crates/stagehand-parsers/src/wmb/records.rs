//! WMB record structures
//!
//! Record layouts are fixed-stride; every nested offset is absolute.

use byteorder::LittleEndian;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cursor::ByteReader;
use crate::traits::{ParseError, ParseResult};

use super::header::Span;

pub const VERTEX_GROUP_SIZE: usize = 28;
pub const BATCH_SIZE: usize = 20;
pub const MESH_SIZE: usize = 68;
pub const BONE_SIZE: usize = 88;
pub const BONE_SET_SIZE: usize = 8;
pub const MATERIAL_SIZE: usize = 24;
pub const TEXTURE_SIZE: usize = 8;
pub const BATCH_DESCRIPTION_SIZE: usize = 32;
pub const BATCH_DATA_SIZE: usize = 16;

/// A vertex with its position in source axis order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    /// Normal/UV/colour bytes of the extended format, kept verbatim
    pub payload: Option<[u8; 20]>,
}

impl Vertex {
    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position,
            payload: None,
        }
    }
}

/// A contiguous vertex buffer and its index buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexGroup {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
    /// Two undocumented u32 fields, carried through untouched
    pub opaque: [u32; 2],
    /// Offset of per-vertex extra data; the data itself is not decoded
    pub ex_data_offset: u32,
}

impl VertexGroup {
    /// Decode the 28-byte record and both buffers it points to
    pub(crate) fn parse(reader: &mut ByteReader<'_, LittleEndian>, stride: usize, extended: bool) -> ParseResult<Self> {
        let vertex_offset = reader.read_u32()?;
        let ex_data_offset = reader.read_u32()?;
        let opaque = [reader.read_u32()?, reader.read_u32()?];
        let vertex_count = reader.read_u32()?;
        let index_offset = reader.read_u32()?;
        let index_count = reader.read_u32()?;

        let vertices = reader.with_position(vertex_offset as usize, |r| {
            let mut vertices = Vec::with_capacity((vertex_count as usize).min(r.remaining() / stride.max(1)));
            for _ in 0..vertex_count {
                let position = r.read_vec3()?;
                let payload = if extended { Some(r.read_array::<20>()?) } else { None };
                vertices.push(Vertex { position, payload });
            }
            Ok(vertices)
        })?;

        let indices = reader.with_position(index_offset as usize, |r| r.read_u16s(index_count as usize))?;

        Ok(Self {
            vertices,
            indices,
            opaque,
            ex_data_offset,
        })
    }
}

/// A draw range into one vertex group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub vertex_group_index: u32,
    pub vertex_start: u32,
    pub index_start: u32,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl Batch {
    pub(crate) fn parse(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        Ok(Self {
            vertex_group_index: reader.read_u32()?,
            vertex_start: reader.read_u32()?,
            index_start: reader.read_u32()?,
            vertex_count: reader.read_u32()?,
            index_count: reader.read_u32()?,
        })
    }
}

/// Batch index list; most meshes reference only a handful of batches
pub type BatchList = SmallVec<[u16; 8]>;

/// A named mesh referencing batches and materials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    pub bounding_box: [f32; 6],
    pub batches: BatchList,
    /// Secondary batch lists (LOD and shadow passes), preserved for re-encoding
    pub auxiliary_batches: [BatchList; 3],
    pub materials: SmallVec<[u16; 4]>,
}

impl Mesh {
    /// Decode one 68-byte mesh record.
    ///
    /// Nested name and index arrays are read through `with_position`, so the
    /// cursor is left immediately after the fixed fields for the next mesh.
    pub(crate) fn parse(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        let name_offset = reader.read_u32()?;
        let mut bounding_box = [0.0f32; 6];
        for value in &mut bounding_box {
            *value = reader.read_f32()?;
        }
        let batch_span = Span::read(reader)?;
        let aux_spans = [Span::read(reader)?, Span::read(reader)?, Span::read(reader)?];
        let material_span = Span::read(reader)?;

        let name = reader.with_position(name_offset as usize, |r| r.read_null_terminated_string())?;
        let batches = read_u16_list(reader, batch_span)?;
        let auxiliary_batches = [
            read_u16_list(reader, aux_spans[0])?,
            read_u16_list(reader, aux_spans[1])?,
            read_u16_list(reader, aux_spans[2])?,
        ];
        let materials = read_u16_list(reader, material_span)?;

        Ok(Self {
            name,
            bounding_box,
            batches,
            auxiliary_batches,
            materials,
        })
    }
}

fn read_u16_list<A: smallvec::Array<Item = u16>>(
    reader: &mut ByteReader<'_, LittleEndian>,
    span: Span,
) -> ParseResult<SmallVec<A>> {
    if span.is_empty() {
        return Ok(SmallVec::new());
    }
    reader.with_position(span.offset as usize, |r| {
        Ok(r.read_u16s(span.count as usize)?.into_iter().collect())
    })
}

/// A skeleton bone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub id: i16,
    pub parent: i16,
    pub local_position: [f32; 3],
    pub local_rotation: [f32; 3],
    pub local_scale: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    pub t_position: [f32; 3],
}

impl Bone {
    pub(crate) fn parse(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        Ok(Self {
            id: reader.read_i16()?,
            parent: reader.read_i16()?,
            local_position: reader.read_vec3()?,
            local_rotation: reader.read_vec3()?,
            local_scale: reader.read_vec3()?,
            position: reader.read_vec3()?,
            rotation: reader.read_vec3()?,
            scale: reader.read_vec3()?,
            t_position: reader.read_vec3()?,
        })
    }

    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }
}

/// Parse a bone set record and its bone index array
pub(crate) fn parse_bone_set(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Vec<u8>> {
    let span = Span::read(reader)?;
    if span.is_empty() {
        return Ok(Vec::new());
    }
    reader.with_position(span.offset as usize, |r| Ok(r.read_bytes(span.count as usize)?.to_vec()))
}

/// A material: shader name, texture references and parameter groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub shader_name: String,
    pub textures: Vec<u32>,
    pub parameters: Vec<[f32; 4]>,
    pub opaque: u32,
    pub opaque_shorts: [u16; 2],
}

impl Material {
    pub(crate) fn parse(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        let shader_name_offset = reader.read_u32()?;
        let textures_offset = reader.read_u32()?;
        let opaque = reader.read_u32()?;
        let parameters_offset = reader.read_u32()?;
        let texture_count = reader.read_u16()?;
        let opaque_shorts = [reader.read_u16()?, reader.read_u16()?];
        let parameter_count = reader.read_u16()?;

        let shader_name = reader.with_position(shader_name_offset as usize, |r| r.read_null_terminated_string())?;
        let textures = if texture_count == 0 {
            Vec::new()
        } else {
            reader.with_position(textures_offset as usize, |r| r.read_u32s(texture_count as usize))?
        };
        let parameters = if parameter_count == 0 {
            Vec::new()
        } else {
            reader.with_position(parameters_offset as usize, |r| {
                let flat = r.read_f32s(parameter_count as usize * 4)?;
                Ok(flat.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect())
            })?
        };

        Ok(Self {
            shader_name,
            textures,
            parameters,
            opaque,
            opaque_shorts,
        })
    }
}

/// A texture reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Texture {
    pub flags: u32,
    pub id: u32,
}

impl Texture {
    pub(crate) fn parse(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        Ok(Self {
            flags: reader.read_u32()?,
            id: reader.read_u32()?,
        })
    }
}

/// Links a batch to its mesh, material and bone set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchData {
    pub batch_index: u32,
    pub mesh_index: u32,
    pub material_index: u16,
    pub bone_set_index: i16,
    pub opaque: u32,
}

impl BatchData {
    fn parse(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        Ok(Self {
            batch_index: reader.read_u32()?,
            mesh_index: reader.read_u32()?,
            material_index: reader.read_u16()?,
            bone_set_index: reader.read_i16()?,
            opaque: reader.read_u32()?,
        })
    }
}

/// Four lists of batch data, one per render pass group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDescription {
    pub groups: [Vec<BatchData>; 4],
}

impl BatchDescription {
    pub(crate) fn parse(reader: &mut ByteReader<'_, LittleEndian>, offset: u32) -> ParseResult<Self> {
        reader.with_position(offset as usize, |r| {
            let spans = [Span::read(r)?, Span::read(r)?, Span::read(r)?, Span::read(r)?];
            let mut groups: [Vec<BatchData>; 4] = Default::default();
            for (group, span) in groups.iter_mut().zip(spans) {
                if span.is_empty() {
                    continue;
                }
                *group = r.with_position(span.offset as usize, |r| {
                    (0..span.count).map(|_| BatchData::parse(r)).collect::<ParseResult<Vec<_>>>()
                })?;
            }
            Ok(Self { groups })
        })
    }

    /// Material index assigned to `batch_index`, searching groups in order
    pub fn material_for_batch(&self, batch_index: usize) -> Option<u16> {
        self.groups
            .iter()
            .flatten()
            .find(|data| data.batch_index as usize == batch_index)
            .map(|data| data.material_index)
    }
}

/// Check that `index` addresses one of `len` records
pub(crate) fn check_index(index: usize, len: usize, what: &str, owner: &str) -> ParseResult<()> {
    if index >= len {
        return Err(ParseError::corrupt(
            0,
            format!("{} references {} {} but only {} exist", owner, what, index, len),
        ));
    }
    Ok(())
}
