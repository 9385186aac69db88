//! Property tests for codec invariants

mod common;

use proptest::prelude::*;

use stagehand_parsers::mot::{self, Channel, CAMERA_ID, CAM_TARGET_ID};
use stagehand_parsers::scr::model_extents;
use stagehand_parsers::traits::{ErrorClass, ParseOptions};
use stagehand_parsers::transform::{decode_ly2_rotation, LY2_ROTATION_SCALE};
use stagehand_parsers::wmb::WmbModel;

use common::{dense_record, fan_model};

fn bone_index() -> impl Strategy<Value = u16> {
    prop_oneof![
        0u16..64,
        Just(CAMERA_ID),
        Just(CAM_TARGET_ID),
        Just(0xFFFF),
    ]
}

proptest! {
    #[test]
    fn triangle_indices_stay_within_batch(
        vertex_count in 3u16..24,
        raw_indices in prop::collection::vec(0u16..32, 3..60),
    ) {
        let mut model = fan_model(1, false);
        let template = model.vertex_groups[0].vertices[0];
        model.vertex_groups[0].vertices = vec![template; usize::from(vertex_count)];
        model.vertex_groups[0].indices = raw_indices.clone();
        model.batches[0].vertex_count = u32::from(vertex_count);
        model.batches[0].index_count = raw_indices.len() as u32;

        let decoded = WmbModel::decode(&model.encode().unwrap()).unwrap();
        match decoded.submeshes(&ParseOptions::default()) {
            Ok(submeshes) => {
                for triangle in &submeshes[0].triangles {
                    prop_assert!(triangle.iter().all(|&i| i < u32::from(vertex_count)));
                }
                prop_assert_eq!(submeshes[0].triangles.len(), raw_indices.len() / 3);
            }
            Err(err) => {
                prop_assert_eq!(err.class(), ErrorClass::Corrupt);
                prop_assert!(raw_indices.iter().any(|&i| i >= vertex_count));
            }
        }
    }

    #[test]
    fn classification_partitions_records(bones in prop::collection::vec(bone_index(), 0..40)) {
        let records: Vec<_> = bones
            .iter()
            .map(|&bone| dense_record(bone, Channel::Location, 0, &[0.0]))
            .collect();

        let (armature, camera) = mot::partition(&records);
        prop_assert_eq!(armature.len() + camera.len(), records.len());
        prop_assert!(armature.iter().all(|r| !r.is_camera()));
        prop_assert!(camera.iter().all(|r| r.is_camera()));

        let classification = mot::classify(&records);
        let any_camera = bones.iter().any(|&b| b == CAMERA_ID || b == CAM_TARGET_ID);
        prop_assert_eq!(classification.has_camera, any_camera);
        prop_assert_eq!(classification.has_armature, !armature.is_empty());
    }

    #[test]
    fn scr_extents_tile_the_file(
        offsets in prop::collection::btree_set(0u32..10_000, 1..12),
        tail in 0u32..500,
    ) {
        let offsets: Vec<u32> = offsets.into_iter().rev().collect();
        let file_size = offsets.iter().max().copied().unwrap_or(0) + tail;
        let extents = model_extents(&offsets, file_size);

        prop_assert_eq!(extents.len(), offsets.len());
        let total: u32 = extents.iter().map(|r| r.len()).sum();
        let first = offsets.iter().min().copied().unwrap_or(0);
        prop_assert_eq!(total, file_size - first);
        for (extent, &offset) in extents.iter().zip(&offsets) {
            prop_assert_eq!(extent.start, offset);
            prop_assert!(extent.fits_within(file_size as usize));
        }
    }

    #[test]
    fn ly2_rotation_is_linear_in_the_raw_byte(raw in any::<u8>()) {
        let angle = decode_ly2_rotation(raw);
        prop_assert!((angle - f32::from(raw) * LY2_ROTATION_SCALE).abs() < 1e-6);
        prop_assert!((0.0..std::f32::consts::TAU).contains(&angle));
    }
}

#[test]
fn ly2_rotation_anchor_values() {
    assert_eq!(decode_ly2_rotation(0), 0.0);
    assert!((decode_ly2_rotation(128) - std::f32::consts::PI).abs() < 1e-6);
}
