mod common;

use common::*;
use stagehand_core::DiagnosticKind;
use stagehand_parsers::mot::{Channel, MotFile, Target};
use stagehand_scene::{JsonSceneSink, MotImporter, ObjectKind, SceneDocument, SceneObject, SceneSink};

fn only(doc: &SceneDocument, kind: ObjectKind) -> &SceneObject {
    let mut objects = doc.objects_of_kind(kind);
    let object = objects.next().unwrap();
    assert!(objects.next().is_none(), "more than one {:?}", kind);
    object
}

fn wrapped_once(doc: &SceneDocument, object: &SceneObject) -> bool {
    let Some(parent) = object.parent.and_then(|id| doc.object(id)) else {
        return false;
    };
    parent.kind == ObjectKind::AxisWrapper && parent.parent.is_none()
}

#[test]
fn test_armature_and_camera_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let mot_path = write_mixed_mot(dir.path());
    let mut sink = JsonSceneSink::new().with_armature("pl0010", [0, 1, 2]);

    let summary = MotImporter::new().import(&mot_path, &mut sink).unwrap();
    assert!(summary.classification.has_armature && summary.classification.has_camera);
    assert_eq!(summary.armature_curves, 1);
    assert_eq!(summary.camera_curves, 2);
    assert_eq!(summary.report.count(DiagnosticKind::UnresolvedBone), 1);
    assert_eq!(summary.seq_file, None);

    let doc = sink.document();
    let armature = only(doc, ObjectKind::Armature);
    assert!(armature.bind_pose_reset);
    assert!(wrapped_once(doc, armature));
    assert_eq!(armature.actions.len(), 1);
    assert_eq!(armature.actions[0].info.name, "pl0010_0001");
    assert_eq!(armature.actions[0].curves[0].target, Target::Bone(0));

    let camera = only(doc, ObjectKind::Camera);
    let target = only(doc, ObjectKind::CameraTarget);
    assert!(wrapped_once(doc, camera) && wrapped_once(doc, target));
    assert_eq!(doc.objects_of_kind(ObjectKind::AxisWrapper).count(), 3);
    assert_eq!(camera.actions[0].info.name, "pl0010_0001 - Camera");
    assert_eq!(target.actions[0].info.name, "pl0010_0001 - Target");
    assert_eq!(camera.actions[0].curves[0].curve.sample(2.0), 6.0);
    assert_eq!(target.actions[0].curves[0].target, Target::CameraTarget);

    let playback = doc.playback.unwrap();
    assert_eq!((playback.start, playback.end, playback.fps), (0, 3, 60.0));
}

#[test]
fn test_camera_only_leaves_armature_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut mot = MotFile::new("cam_0100", 120);
    mot.records = vec![dense_record(
        stagehand_parsers::mot::CAMERA_ID,
        Channel::Rotation,
        0,
        &[0.0, 0.1],
    )];
    let mot_path = write_mot(dir.path(), &mot);
    let mut sink = JsonSceneSink::new().with_armature("pl0010", [0]);

    let summary = MotImporter::new().import(&mot_path, &mut sink).unwrap();
    assert!(!summary.classification.has_armature);
    assert_eq!(summary.camera_curves, 1);

    let doc = sink.document();
    let armature = only(doc, ObjectKind::Armature);
    assert!(!armature.bind_pose_reset);
    assert!(armature.parent.is_none());
    // The target is ensured even when only the camera is keyed
    only(doc, ObjectKind::CameraTarget);
    assert_eq!(doc.playback.unwrap().end, 119);
}

#[test]
fn test_bone_tracks_without_armature_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mot_path = write_mixed_mot(dir.path());
    let mut sink = JsonSceneSink::new();

    let summary = MotImporter::new().import(&mot_path, &mut sink).unwrap();
    assert_eq!(summary.armature_curves, 0);
    assert_eq!(summary.camera_curves, 2);
    assert_eq!(summary.report.count(DiagnosticKind::UnresolvedBone), 1);
    assert_eq!(sink.document().objects_of_kind(ObjectKind::Armature).count(), 0);
}

#[test]
fn test_attack_markers_from_first_sibling() {
    let dir = tempfile::tempdir().unwrap();
    let mot_path = write_mixed_mot(dir.path());
    write_attack_seq(&mot_path, 1, &[("0.5", "1.0"), ("2.0", "2.05")]);
    write_attack_seq(&mot_path, 2, &[("9.0", "9.5")]);
    let mut sink = JsonSceneSink::new().with_armature("pl0010", [0, 3]);

    let importer = MotImporter::new();
    let summary = importer.import(&mot_path, &mut sink).unwrap();
    assert!(summary.seq_file.unwrap().ends_with("pl0010_0001_1_seq.bxm"));
    assert_eq!(summary.attack_markers, 2);

    // A second import replaces the markers instead of stacking them
    importer.import(&mot_path, &mut sink).unwrap();

    let doc = sink.document();
    let armature = sink.document().objects_of_kind(ObjectKind::Armature).next().unwrap().id;
    let markers: Vec<_> = doc.objects_of_kind(ObjectKind::AttackMarker).collect();
    assert_eq!(markers.len(), 2);
    assert_eq!(markers[0].name, "Attack30-60");
    assert_eq!(markers[1].name, "Attack120-123");
    assert!(markers.iter().all(|m| m.parent == Some(armature)));
    assert_eq!(markers[0].transform.scale, [2.0; 3]);
    assert_eq!(
        markers[0].visibility_keys,
        [(29, false), (30, true), (60, true), (61, false)]
    );
}

#[test]
fn test_unreadable_sequence_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mot_path = write_mixed_mot(dir.path());
    std::fs::write(dir.path().join("pl0010_0001_0_seq.bxm"), b"BXM\0").unwrap();
    let mut sink = JsonSceneSink::new().with_armature("pl0010", [0, 3]);

    let summary = MotImporter::new().import(&mot_path, &mut sink).unwrap();
    assert_eq!(summary.attack_markers, 0);
    assert_eq!(summary.report.count(DiagnosticKind::CorruptRecord), 1);
    assert!(sink.document().playback.is_some());
}

#[test]
fn test_find_armature_is_the_only_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let mot_path = write_mixed_mot(dir.path());
    let mut sink = JsonSceneSink::new().with_armature("pl0010", [0, 3]);
    let armature = sink.find_armature().unwrap();

    MotImporter::new().import(&mot_path, &mut sink).unwrap();
    assert_eq!(sink.find_armature(), Some(armature));
    assert!(sink.has_bone(armature, 3));
}
