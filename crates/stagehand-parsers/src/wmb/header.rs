//! WMB header structures

use byteorder::LittleEndian;
use serde::{Deserialize, Serialize};

use crate::cursor::{ByteReader, ByteWriter};
use crate::traits::{expect_magic, ParseResult};

use super::WMB_MAGIC;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 112;

/// An (offset, count) pair into the same byte store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: u32,
    pub count: u32,
}

impl Span {
    pub fn new(offset: u32, count: u32) -> Self {
        Self { offset, count }
    }

    pub fn read(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        Ok(Self {
            offset: reader.read_u32()?,
            count: reader.read_u32()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter<LittleEndian>) {
        writer.write_u32(self.offset);
        writer.write_u32(self.count);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Offset tables declared by the header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetTables {
    pub vertex_groups: Span,
    pub batches: Span,
    pub batch_description: u32,
    pub bones: Span,
    /// Count is a byte size for this table
    pub bone_index_translate_table: Span,
    pub bone_sets: Span,
    pub materials: Span,
    pub textures: Span,
    pub meshes: Span,
    pub cutting_data: u32,
}

/// WMB header (112 bytes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WmbHeader {
    pub version: u32,
    pub vertex_format: u32,
    pub flags: u16,
    pub reference_bone: i16,
    pub bounding_box: [f32; 6],
    pub tables: OffsetTables,
}

impl WmbHeader {
    /// Parse the header; the magic is checked before anything else is read
    pub fn parse(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        expect_magic("WMB", reader.data(), WMB_MAGIC)?;
        reader.seek(4)?;

        let version = reader.read_u32()?;
        let vertex_format = reader.read_u32()?;
        let flags = reader.read_u16()?;
        let reference_bone = reader.read_i16()?;

        let mut bounding_box = [0.0f32; 6];
        for value in &mut bounding_box {
            *value = reader.read_f32()?;
        }

        let tables = OffsetTables {
            vertex_groups: Span::read(reader)?,
            batches: Span::read(reader)?,
            batch_description: reader.read_u32()?,
            bones: Span::read(reader)?,
            bone_index_translate_table: Span::read(reader)?,
            bone_sets: Span::read(reader)?,
            materials: Span::read(reader)?,
            textures: Span::read(reader)?,
            meshes: Span::read(reader)?,
            cutting_data: reader.read_u32()?,
        };

        Ok(Self {
            version,
            vertex_format,
            flags,
            reference_bone,
            bounding_box,
            tables,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter<LittleEndian>) {
        writer.write_bytes(WMB_MAGIC);
        writer.write_u32(self.version);
        writer.write_u32(self.vertex_format);
        writer.write_u16(self.flags);
        writer.write_i16(self.reference_bone);
        for value in self.bounding_box {
            writer.write_f32(value);
        }

        let t = &self.tables;
        t.vertex_groups.write(writer);
        t.batches.write(writer);
        writer.write_u32(t.batch_description);
        t.bones.write(writer);
        t.bone_index_translate_table.write(writer);
        t.bone_sets.write(writer);
        t.materials.write(writer);
        t.textures.write(writer);
        t.meshes.write(writer);
        writer.write_u32(t.cutting_data);
    }

    /// Whether vertices carry the 20-byte extended payload
    pub fn is_extended_format(&self) -> bool {
        self.vertex_format == super::EXTENDED_VERTEX_FORMAT
    }

    /// Byte stride of one vertex for this header's vertex format
    pub fn vertex_stride(&self) -> usize {
        if self.is_extended_format() {
            super::EXTENDED_VERTEX_STRIDE
        } else {
            super::BASE_VERTEX_STRIDE
        }
    }
}
