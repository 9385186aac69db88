//! Integration tests for the WMB codec

mod common;

use stagehand_parsers::traits::{ErrorClass, ParseOptions, Parser};
use stagehand_parsers::wmb::{WmbModel, WmbParser};

use common::fan_model;

#[test]
fn test_structural_round_trip_keeps_counts() {
    for extended in [false, true] {
        let first = WmbModel::decode(&fan_model(6, extended).encode().unwrap()).unwrap();
        let second = WmbModel::decode(&first.encode().unwrap()).unwrap();

        assert_eq!(first.batches, second.batches);
        assert_eq!(first.vertex_count(), second.vertex_count());
        assert_eq!(first.index_count(), second.index_count());
        assert_eq!(second.vertex_groups[0].opaque, [0x0BAD_F00D, 7]);
        assert_eq!(second.header.is_extended_format(), extended);
    }
}

#[test]
fn test_submesh_triangles_and_material() {
    let model = WmbModel::decode(&fan_model(4, false).encode().unwrap()).unwrap();
    let submeshes = model.submeshes(&ParseOptions::default()).unwrap();

    assert_eq!(submeshes.len(), 1);
    let submesh = &submeshes[0];
    assert_eq!(submesh.name, "0-ground-0");
    assert_eq!(submesh.vertex_count(), 6);
    assert_eq!(submesh.triangle_count(), 4);
    assert_eq!(submesh.triangles[3], [0, 4, 5]);
    assert_eq!(submesh.material_index, Some(0));
    // source (x, y, z) arrives as (x, z, y)
    assert_eq!(submesh.positions[3], [3.0, 1.5, 1.0]);
}

#[test]
fn test_extended_payload_survives_encode() {
    let model = WmbModel::decode(&fan_model(2, true).encode().unwrap()).unwrap();
    assert!(model.vertex_groups[0].vertices.iter().all(|v| v.payload == Some([3u8; 20])));
}

#[test]
fn test_parser_entry_point_validates_in_strict_mode() {
    let mut model = fan_model(2, false);
    model.batches[0].index_count = 5;
    let bytes = model.encode().unwrap();

    let lenient = WmbParser::new().parse_bytes(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(lenient.submeshes(&ParseOptions::default()).unwrap()[0].triangle_count(), 1);

    let strict = ParseOptions {
        strict_validation: true,
        ..ParseOptions::default()
    };
    let err = WmbParser::new().parse_bytes(&bytes, &strict).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Corrupt);
}

#[test]
fn test_bad_batch_reference_is_corrupt() {
    let mut model = fan_model(2, false);
    model.meshes[0].batches.push(9);
    let decoded = WmbModel::decode(&model.encode().unwrap()).unwrap();
    let err = decoded.submeshes(&ParseOptions::default()).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Corrupt);
}

#[test]
fn test_truncated_file_is_reported() {
    let bytes = fan_model(2, false).encode().unwrap();
    let err = WmbModel::decode(&bytes[..60]).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Truncated);
}
