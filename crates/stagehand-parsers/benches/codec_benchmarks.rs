//! Benchmarks for the stagehand codecs
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use smallvec::smallvec;

use stagehand_parsers::ly2::{decode_ly2, Ly2Document, Ly2Entry, Ly2Instance, PropCategory, PropSource, PropType};
use stagehand_parsers::mot::{Channel, KeyEncoding, Keyframe, MotFile, MotRecord, Property};
use stagehand_parsers::traits::ParseOptions;
use stagehand_parsers::wmb::{
    Batch, BatchDescription, Mesh, OffsetTables, Vertex, VertexGroup, WmbHeader, WmbModel, EXTENDED_VERTEX_FORMAT,
};

/// A strip-shaped grid of `quads` quads in one batch
fn grid_model(quads: u16) -> WmbModel {
    let vertices = (0..=quads)
        .flat_map(|x| {
            [0.0f32, 1.0].map(|y| Vertex {
                position: [f32::from(x), y, 0.0],
                payload: Some([0u8; 20]),
            })
        })
        .collect();
    let indices: Vec<u16> = (0..quads)
        .flat_map(|q| {
            let a = q * 2;
            [a, a + 1, a + 2, a + 1, a + 3, a + 2]
        })
        .collect();

    WmbModel {
        header: WmbHeader {
            version: 0x2014_0601,
            vertex_format: EXTENDED_VERTEX_FORMAT,
            flags: 0,
            reference_bone: -1,
            bounding_box: [0.0; 6],
            tables: OffsetTables::default(),
        },
        vertex_groups: vec![VertexGroup {
            vertices,
            indices,
            opaque: [0, 0],
            ex_data_offset: 0,
        }],
        batches: vec![Batch {
            vertex_group_index: 0,
            vertex_start: 0,
            index_start: 0,
            vertex_count: u32::from(quads + 1) * 2,
            index_count: u32::from(quads) * 6,
        }],
        batch_description: BatchDescription::default(),
        bones: Vec::new(),
        bone_index_translate_table: Vec::new(),
        bone_sets: Vec::new(),
        materials: Vec::new(),
        textures: Vec::new(),
        meshes: vec![Mesh {
            name: "grid".into(),
            bounding_box: [0.0; 6],
            batches: smallvec![0],
            auxiliary_batches: Default::default(),
            materials: smallvec![],
        }],
    }
}

fn bench_wmb(c: &mut Criterion) {
    let mut group = c.benchmark_group("wmb");
    let options = ParseOptions::default();

    for quads in [100u16, 1_000, 10_000] {
        let bytes = grid_model(quads).encode().unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("decode", quads), &bytes, |b, bytes| {
            b.iter(|| WmbModel::decode(black_box(bytes)))
        });

        let model = WmbModel::decode(&bytes).unwrap();
        group.bench_with_input(BenchmarkId::new("submeshes", quads), &model, |b, model| {
            b.iter(|| model.submeshes(black_box(&options)))
        });
    }

    group.finish();
}

fn bench_mot(c: &mut Criterion) {
    let mut group = c.benchmark_group("mot");

    for bones in [16u16, 128] {
        let mut mot = MotFile::new("bench", 240);
        for bone in 0..bones {
            for axis in 0..3 {
                mot.records.push(MotRecord {
                    bone_index: bone,
                    property: Property::new(Channel::Rotation, axis),
                    encoding: KeyEncoding::Hermite,
                    keys: (0..24)
                        .map(|k| Keyframe::hermite(k * 10, f32::from(k).sin(), 0.1, -0.1))
                        .collect(),
                    opaque: 0,
                });
            }
        }
        let bytes = mot.encode().unwrap();

        group.bench_with_input(BenchmarkId::new("decode", bones), &bytes, |b, bytes| {
            b.iter(|| MotFile::decode(black_box(bytes)))
        });
        group.bench_with_input(BenchmarkId::new("curves", bones), &mot, |b, mot| {
            b.iter(|| mot.property_animations())
        });
    }

    group.finish();
}

fn bench_ly2(c: &mut Criterion) {
    let entries = (0..64u16)
        .map(|id| {
            Ly2Entry::Prop(PropType {
                flags: [0, 0],
                category: PropCategory::Ba,
                id,
                instances: (0..32u8)
                    .map(|i| Ly2Instance::new([f32::from(i), 0.0, 0.0], i.wrapping_mul(8), [1.0; 3]))
                    .collect(),
            })
        })
        .collect();
    let bytes = Ly2Document {
        flags: 0,
        entries,
        trailer: Vec::new(),
    }
    .encode()
    .unwrap();
    let resolver = |name: &str, _: PropCategory| -> Option<PropSource> {
        Some(PropSource::ExtractedWmb(format!("{}.dat/{}.wmb", name, name).into()))
    };

    c.bench_function("ly2/decode_and_place", |b| b.iter(|| decode_ly2(black_box(&bytes), &resolver)));
}

criterion_group!(benches, bench_wmb, bench_mot, bench_ly2);
criterion_main!(benches);
