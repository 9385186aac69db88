//! MOT header and record table types

use std::fmt;

use byteorder::LittleEndian;
use serde::{Deserialize, Serialize};

use crate::cursor::{ByteReader, ByteWriter};
use crate::traits::{expect_magic, ParseResult};

use super::keyframes::{Interpolation, KeyEncoding, Keyframe};

pub const MOT_MAGIC: &[u8; 4] = b"mot\0";
pub const HEADER_SIZE: usize = 44;
pub const RECORD_SIZE: usize = 12;
pub const NAME_SIZE: usize = 20;

/// Reserved bone index of the camera track
pub const CAMERA_ID: u16 = 0xEA60;
/// Reserved bone index of the camera-target track
pub const CAM_TARGET_ID: u16 = 0xEA61;
/// Bone index addressing the armature object rather than a bone
pub const ARMATURE_OBJECT_ID: u16 = 0xFFFF;
/// Bone index of the record that ends the table
pub const TERMINATOR_ID: u16 = 0x7FFF;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotHeader {
    pub version: u32,
    pub flags: u16,
    pub frame_count: u16,
    pub records_offset: u32,
    /// Declared record count, terminator included
    pub record_count: u32,
    /// Undocumented header word, carried through untouched
    pub unknown: u32,
    pub name: String,
}

impl MotHeader {
    pub fn parse(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        expect_magic("MOT", reader.data(), MOT_MAGIC)?;
        reader.seek(4)?;
        Ok(Self {
            version: reader.read_u32()?,
            flags: reader.read_u16()?,
            frame_count: reader.read_u16()?,
            records_offset: reader.read_u32()?,
            record_count: reader.read_u32()?,
            unknown: reader.read_u32()?,
            name: reader.read_fixed_string(NAME_SIZE)?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter<LittleEndian>) -> ParseResult<()> {
        writer.write_bytes(MOT_MAGIC);
        writer.write_u32(self.version);
        writer.write_u16(self.flags);
        writer.write_u16(self.frame_count);
        writer.write_u32(self.records_offset);
        writer.write_u32(self.record_count);
        writer.write_u32(self.unknown);
        writer.write_fixed_string(&self.name, NAME_SIZE)
    }
}

/// What a record animates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Target {
    Bone(u16),
    Armature,
    Camera,
    CameraTarget,
}

impl Target {
    pub fn from_bone_index(index: u16) -> Self {
        match index {
            CAMERA_ID => Target::Camera,
            CAM_TARGET_ID => Target::CameraTarget,
            ARMATURE_OBJECT_ID => Target::Armature,
            bone => Target::Bone(bone),
        }
    }

    pub fn bone_index(&self) -> u16 {
        match self {
            Target::Bone(bone) => *bone,
            Target::Armature => ARMATURE_OBJECT_ID,
            Target::Camera => CAMERA_ID,
            Target::CameraTarget => CAM_TARGET_ID,
        }
    }

    pub fn is_camera(&self) -> bool {
        matches!(self, Target::Camera | Target::CameraTarget)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Bone(bone) => write!(f, "bone {}", bone),
            Target::Armature => f.write_str("armature"),
            Target::Camera => f.write_str("camera"),
            Target::CameraTarget => f.write_str("camera target"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Location,
    Rotation,
    Scale,
}

/// Animated property: a channel and an axis (0 = X, 1 = Y, 2 = Z)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Property {
    pub channel: Channel,
    pub axis: u8,
}

impl Property {
    pub fn new(channel: Channel, axis: u8) -> Self {
        Self { channel, axis }
    }

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0..=2 => Some(Self::new(Channel::Location, raw)),
            3..=5 => Some(Self::new(Channel::Rotation, raw - 3)),
            7..=9 => Some(Self::new(Channel::Scale, raw - 7)),
            _ => None,
        }
    }

    pub fn to_raw(&self) -> u8 {
        match self.channel {
            Channel::Location => self.axis,
            Channel::Rotation => self.axis + 3,
            Channel::Scale => self.axis + 7,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = ["x", "y", "z"].get(self.axis as usize).copied().unwrap_or("?");
        write!(f, "{:?}.{}", self.channel, axis)
    }
}

/// The fixed 12-byte part of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    pub bone_index: u16,
    pub property: u8,
    pub encoding: u8,
    pub key_count: u16,
    pub opaque: i16,
    /// Inline f32 bits for encoding 0, otherwise the key block offset
    pub value_or_offset: u32,
}

impl RawRecord {
    pub fn parse(reader: &mut ByteReader<'_, LittleEndian>) -> ParseResult<Self> {
        Ok(Self {
            bone_index: reader.read_u16()?,
            property: reader.read_u8()?,
            encoding: reader.read_u8()?,
            key_count: reader.read_u16()?,
            opaque: reader.read_i16()?,
            value_or_offset: reader.read_u32()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter<LittleEndian>) {
        writer.write_u16(self.bone_index);
        writer.write_u8(self.property);
        writer.write_u8(self.encoding);
        writer.write_u16(self.key_count);
        writer.write_i16(self.opaque);
        writer.write_u32(self.value_or_offset);
    }

    pub fn terminator() -> Self {
        Self {
            bone_index: TERMINATOR_ID,
            property: 0xFF,
            encoding: 0,
            key_count: 0,
            opaque: 0,
            value_or_offset: 0,
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.bone_index == TERMINATOR_ID
    }
}

/// One decoded animation track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotRecord {
    pub bone_index: u16,
    pub property: Property,
    /// Encoding the keys were stored with
    pub encoding: KeyEncoding,
    pub keys: Vec<Keyframe>,
    pub opaque: i16,
}

impl MotRecord {
    pub fn target(&self) -> Target {
        Target::from_bone_index(self.bone_index)
    }

    pub fn is_camera(&self) -> bool {
        self.target().is_camera()
    }

    pub fn interpolation(&self) -> Interpolation {
        self.encoding.interpolation()
    }

    /// Last keyed frame, or 0 for a constant track
    pub fn last_frame(&self) -> u16 {
        self.keys.last().map(|k| k.frame).unwrap_or(0)
    }
}
