//! Fixtures shared by the integration tests, built with the codecs' own types

#![allow(dead_code)]

use smallvec::smallvec;
use stagehand_parsers::bxm::BxmNode;
use stagehand_parsers::mot::{Channel, KeyEncoding, Keyframe, MotFile, MotRecord, Property, CAMERA_ID, CAM_TARGET_ID};
use stagehand_parsers::wmb::{
    Batch, BatchDescription, Material, Mesh, OffsetTables, Texture, Vertex, VertexGroup, WmbHeader, WmbModel,
    EXTENDED_VERTEX_FORMAT,
};

/// One vertex group holding a fan of `triangles` triangles, one batch per triangle pair
pub fn fan_model(triangles: u16, extended: bool) -> WmbModel {
    let payload = extended.then_some([3u8; 20]);
    let vertex_count = triangles + 2;
    let vertices = (0..vertex_count)
        .map(|i| Vertex {
            position: [f32::from(i), f32::from(i % 2), f32::from(i) * 0.5],
            payload,
        })
        .collect();
    let indices: Vec<u16> = (0..triangles).flat_map(|t| [0, t + 1, t + 2]).collect();

    let batch = Batch {
        vertex_group_index: 0,
        vertex_start: 0,
        index_start: 0,
        vertex_count: u32::from(vertex_count),
        index_count: u32::from(triangles) * 3,
    };

    WmbModel {
        header: WmbHeader {
            version: 0x2014_0601,
            vertex_format: if extended { EXTENDED_VERTEX_FORMAT } else { 0x107 },
            flags: 0,
            reference_bone: -1,
            bounding_box: [0.0, 0.0, 0.0, f32::from(vertex_count), 1.0, f32::from(vertex_count)],
            tables: OffsetTables::default(),
        },
        vertex_groups: vec![VertexGroup {
            vertices,
            indices,
            opaque: [0x0BAD_F00D, 7],
            ex_data_offset: 0,
        }],
        batches: vec![batch],
        batch_description: BatchDescription::default(),
        bones: Vec::new(),
        bone_index_translate_table: Vec::new(),
        bone_sets: Vec::new(),
        materials: vec![Material {
            shader_name: "STG00_XXXXX".into(),
            textures: vec![0xA0],
            parameters: vec![[0.0, 0.0, 0.0, 1.0]],
            opaque: 0,
            opaque_shorts: [0, 0],
        }],
        textures: vec![Texture { flags: 0, id: 0xA0 }],
        meshes: vec![Mesh {
            name: "ground".into(),
            bounding_box: [0.0; 6],
            batches: smallvec![0],
            auxiliary_batches: Default::default(),
            materials: smallvec![0],
        }],
    }
}

pub fn dense_record(bone_index: u16, channel: Channel, axis: u8, values: &[f32]) -> MotRecord {
    MotRecord {
        bone_index,
        property: Property::new(channel, axis),
        encoding: KeyEncoding::Float,
        keys: values
            .iter()
            .enumerate()
            .map(|(frame, &value)| Keyframe::new(frame as u16, value))
            .collect(),
        opaque: 0,
    }
}

/// Two bone tracks plus camera and camera-target tracks
pub fn mixed_mot() -> MotFile {
    let mut mot = MotFile::new("pl0010_0001", 4);
    mot.records = vec![
        dense_record(0, Channel::Location, 0, &[0.0, 1.0, 2.0, 3.0]),
        dense_record(3, Channel::Rotation, 1, &[0.0, 0.5, 1.0, 1.5]),
        dense_record(CAMERA_ID, Channel::Location, 2, &[5.0, 5.0, 6.0, 6.0]),
        dense_record(CAM_TARGET_ID, Channel::Location, 0, &[1.0, 1.0, 1.0, 1.0]),
    ];
    mot
}

pub fn attack_seq(start: &str, end: &str) -> BxmNode {
    BxmNode::new("SeqRoot").with_child(
        BxmNode::new("AttackTrack").with_child(
            BxmNode::new("Seq")
                .with_attribute("StartTime", start)
                .with_attribute("EndTime", end)
                .with_attribute("Shape", "2")
                .with_attribute("Offset", "0 1 0")
                .with_attribute("Rot", "0 0 0")
                .with_attribute("Size", "1 1 1"),
        ),
    )
}
