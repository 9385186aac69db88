//! Fixtures for the import pipelines, written to temporary stage layouts

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use stagehand_parsers::bxm::{BxmDocument, BxmNode};
use stagehand_parsers::dat::{DatArchive, DatEntry};
use stagehand_parsers::ly2::{Ly2Document, Ly2Entry, Ly2Instance, PropCategory, PropType};
use stagehand_parsers::mot::{Channel, KeyEncoding, Keyframe, MotFile, MotRecord, Property, CAMERA_ID, CAM_TARGET_ID};
use stagehand_parsers::scr::{ScrFile, ScrModel};
use stagehand_parsers::wmb::{
    Batch, BatchDescription, Material, Mesh, OffsetTables, Vertex, VertexGroup, WmbHeader, WmbModel,
};
use stagehand_parsers::Transform;

/// A single-quad model: one mesh, one batch, two triangles
pub fn quad_model(mesh_name: &str) -> WmbModel {
    let vertices = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
        .into_iter()
        .map(Vertex::new)
        .collect();

    WmbModel {
        header: WmbHeader {
            version: 0x2014_0601,
            vertex_format: 0x107,
            flags: 0,
            reference_bone: -1,
            bounding_box: [0.0, 0.0, 0.0, 1.0, 1.0, 0.0],
            tables: OffsetTables::default(),
        },
        vertex_groups: vec![VertexGroup {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
            opaque: [0, 0],
            ex_data_offset: 0,
        }],
        batches: vec![Batch {
            vertex_group_index: 0,
            vertex_start: 0,
            index_start: 0,
            vertex_count: 4,
            index_count: 6,
        }],
        batch_description: BatchDescription::default(),
        bones: Vec::new(),
        bone_index_translate_table: Vec::new(),
        bone_sets: Vec::new(),
        materials: vec![Material {
            shader_name: "PRP00_XXXXX".into(),
            textures: Vec::new(),
            parameters: Vec::new(),
            opaque: 0,
            opaque_shorts: [0, 0],
        }],
        textures: Vec::new(),
        meshes: vec![Mesh {
            name: mesh_name.into(),
            bounding_box: [0.0; 6],
            batches: [0].into_iter().collect(),
            auxiliary_batches: Default::default(),
            materials: [0].into_iter().collect(),
        }],
    }
}

pub fn quad_bytes(mesh_name: &str) -> Vec<u8> {
    quad_model(mesh_name).encode().unwrap()
}

/// `<tmp>/data/st1/r100/`, three levels below the archive root
pub struct StageLayout {
    pub root: tempfile::TempDir,
    pub scr_dir: PathBuf,
}

impl StageLayout {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let scr_dir = root.path().join("data").join("st1").join("r100");
        std::fs::create_dir_all(&scr_dir).unwrap();
        Self { root, scr_dir }
    }

    pub fn scr_path(&self) -> PathBuf {
        self.scr_dir.join("r100.scr")
    }

    pub fn write_scr(&self, models: Vec<ScrModel>) -> PathBuf {
        let scr = ScrFile { unknown: 0, models };
        std::fs::write(self.scr_path(), scr.encode().unwrap()).unwrap();
        self.scr_path()
    }

    pub fn write_ly2(&self, document: &Ly2Document) {
        std::fs::write(self.scr_dir.join("r100.ly2"), document.encode().unwrap()).unwrap();
    }

    /// `<scr dir>/../<name>.dat/<name>.wmb`
    pub fn extracted_prop(&self, name: &str, wmb: Option<Vec<u8>>) {
        let dir = self.scr_dir.join("..").join(format!("{}.dat", name));
        std::fs::create_dir_all(&dir).unwrap();
        if let Some(bytes) = wmb {
            std::fs::write(dir.join(format!("{}.wmb", name)), bytes).unwrap();
        }
    }

    /// `<archive root>/<category>/<name>.dtt` holding `<name>.wmb`
    pub fn archived_prop(&self, category: &str, name: &str) {
        let dir = self.root.path().join(category);
        std::fs::create_dir_all(&dir).unwrap();
        let archive = DatArchive {
            entries: vec![
                DatEntry::new(format!("{}.wta", name), vec![0u8; 8]),
                DatEntry::new(format!("{}.wmb", name), quad_bytes(name)),
            ],
        };
        std::fs::write(dir.join(format!("{}.dtt", name)), archive.encode().unwrap()).unwrap();
    }
}

pub fn scr_model(name: &str, data: Vec<u8>) -> ScrModel {
    ScrModel::new(name, Transform::new([10.0, 0.0, 0.0], [0.0; 3], [1.0; 3]), data)
}

pub fn prop(category: PropCategory, id: u16, instances: usize) -> Ly2Entry {
    Ly2Entry::Prop(PropType {
        flags: [id.into(), 1],
        category,
        id,
        instances: (0..instances)
            .map(|i| Ly2Instance::new([i as f32, 0.0, 0.0], 64, [1.0; 3]))
            .collect(),
    })
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

/// Bones 0 and 3, camera and camera target, over 4 frames
pub fn write_mixed_mot(dir: &Path) -> PathBuf {
    let mut mot = MotFile::new("pl0010_0001", 4);
    mot.records = vec![
        dense_record(0, Channel::Location, 0, &[0.0, 1.0, 2.0, 3.0]),
        dense_record(3, Channel::Rotation, 1, &[0.0, 0.5, 1.0, 1.5]),
        dense_record(CAMERA_ID, Channel::Location, 2, &[5.0, 5.0, 6.0, 6.0]),
        dense_record(CAM_TARGET_ID, Channel::Location, 0, &[1.0, 1.0, 1.0, 1.0]),
    ];
    write_mot(dir, &mot)
}

pub fn write_mot(dir: &Path, mot: &MotFile) -> PathBuf {
    let path = dir.join(format!("{}.mot", mot.header.name));
    std::fs::write(&path, mot.encode().unwrap()).unwrap();
    path
}

pub fn write_attack_seq(mot_path: &Path, slot: usize, sequences: &[(&str, &str)]) {
    let mut track = BxmNode::new("AttackTrack");
    for (start, end) in sequences {
        track = track.with_child(
            BxmNode::new("Seq")
                .with_attribute("StartTime", *start)
                .with_attribute("EndTime", *end)
                .with_attribute("Shape", "1")
                .with_attribute("Offset", "0 1.5 0")
                .with_attribute("Rot", "0 0 0")
                .with_attribute("Size", "2 2 2"),
        );
    }
    let document = BxmDocument::from(BxmNode::new("SeqRoot").with_child(track));
    let stem = mot_path.file_stem().unwrap().to_string_lossy();
    let path = mot_path.with_file_name(format!("{}_{}_seq.bxm", stem, slot));
    std::fs::write(path, document.encode().unwrap()).unwrap();
}
