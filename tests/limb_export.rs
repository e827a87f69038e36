//! End-to-end tests: synthetic GLB in, per-side GLBs out.

mod common;

use std::collections::HashSet;

use tempfile::tempdir;

use limb_rigger::scene::{Armature, Mesh};
use limb_rigger::{export_limbs, import_scene, inspect_scene, ExportOptions, RigError, Side};

use common::{bone_name, KEPT_BONE_QUADS};

fn single(scene: &limb_rigger::Scene) -> (&str, &Armature, &str, &Mesh) {
    let armature = scene.first_armature().expect("No armature");
    let mesh = scene.first_mesh().expect("No mesh");
    (
        &armature.name,
        armature.armature().unwrap(),
        &mesh.name,
        mesh.mesh().unwrap(),
    )
}

#[test]
fn test_source_imports_as_one_armature_and_mesh() {
    let dir = tempdir().expect("Failed to create temp dir");
    let source = common::write_source(dir.path());

    let scene = import_scene(&source).expect("Import failed");
    let (armature_name, armature, mesh_name, mesh) = single(&scene);

    assert_eq!(armature_name, "Armature");
    assert_eq!(mesh_name, "Body");
    assert_eq!(armature.bones.len(), common::skeleton().bones.len());
    assert_eq!(armature.bones[0].name, bone_name("Hips"));
    assert_eq!(mesh.vertex_groups.len(), armature.bones.len());
    assert_eq!(mesh.armature_modifier(), Some("Armature"));
    assert_eq!(mesh.vertex_count(), (armature.bones.len() + 2) * 4);

    let report = inspect_scene(&scene, 20);
    assert_eq!(report.armatures.len(), 1);
    assert_eq!(report.meshes[0].vertex_groups.len(), 20);
}

#[test]
fn test_export_both_sides() {
    let dir = tempdir().expect("Failed to create temp dir");
    let source = common::write_source(dir.path());
    let out = dir.path().join("Hands");

    let reports = export_limbs(&source, &ExportOptions::new(&out)).expect("Export failed");

    assert_eq!(reports.len(), 2);
    let (left, right) = (&reports[0], &reports[1]);
    assert_eq!(left.side, Side::Left);
    assert_eq!(left.path, out.join("left_hand_elbow.glb"));
    assert_eq!(right.path, out.join("right_hand_elbow.glb"));

    assert_eq!(left.bones, 6);
    assert_eq!(right.bones, 6);
    // the elbow blend quad survives on the left, the upper-arm quad does not
    assert_eq!(left.vertices, (KEPT_BONE_QUADS + 1) * 4);
    assert_eq!(right.vertices, KEPT_BONE_QUADS * 4);
    assert_eq!(left.vertex_groups, 4);
    assert!(left.path.exists());
    assert!(right.path.exists());
}

#[test]
fn test_exported_file_contents() {
    let dir = tempdir().expect("Failed to create temp dir");
    let source = common::write_source(dir.path());
    let out = dir.path().join("Hands");
    export_limbs(&source, &ExportOptions::new(&out)).expect("Export failed");

    let scene = import_scene(&out.join("left_hand_elbow.glb")).expect("Re-import failed");
    assert_eq!(scene.objects().len(), 2);
    let (armature_name, armature, mesh_name, mesh) = single(&scene);

    assert_eq!(armature_name, "LeftArmature");
    assert_eq!(mesh_name, "LeftHandMesh");
    assert_eq!(mesh.armature_modifier(), Some("LeftArmature"));

    let names: Vec<&str> = armature.bones.iter().map(|b| b.name.as_str()).collect();
    let expected: Vec<String> = ["Shoulder", "Arm", "ForeArm", "Hand", "HandIndex1", "HandIndex2"]
        .iter()
        .map(|b| bone_name(&format!("Left{}", b)))
        .collect();
    assert_eq!(names, expected);
    assert_eq!(armature.bones[0].parent, None);

    // surviving bones stay where they were
    let original = common::skeleton();
    for (i, bone) in armature.bones.iter().enumerate() {
        let j = original.bone_index(&bone.name).unwrap();
        let moved = armature.armature_space(i).w_axis - original.armature_space(j).w_axis;
        let delta = moved.length();
        assert!(delta < 1e-4, "{} moved by {}", bone.name, delta);
        assert_eq!(bone.inverse_bind, original.bones[j].inverse_bind);
    }

    // groups mirror the kept bones; only the allowed ones carry weight
    let groups: Vec<&str> = mesh.vertex_groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(groups, names);
    let allowed: HashSet<String> = ["ForeArm", "Hand", "HandIndex1", "HandIndex2"]
        .iter()
        .map(|b| bone_name(&format!("Left{}", b)))
        .collect();
    for entries in &mesh.deform {
        assert!(!entries.is_empty());
        for (group, weight) in entries {
            assert!(allowed.contains(&mesh.vertex_groups[*group].name));
            assert!(*weight > 0.0001);
        }
    }
    assert_eq!(mesh.indices.len() % 3, 0);
    assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
}

#[test]
fn test_export_is_deterministic() {
    let dir = tempdir().expect("Failed to create temp dir");
    let source = common::write_source(dir.path());
    let first = dir.path().join("a");
    let second = dir.path().join("b");

    let a = export_limbs(&source, &ExportOptions::new(&first)).expect("Export failed");
    let b = export_limbs(&source, &ExportOptions::new(&second)).expect("Export failed");

    for (ra, rb) in a.iter().zip(&b) {
        assert_eq!(ra.bones, rb.bones);
        assert_eq!(ra.vertices, rb.vertices);
        let bytes_a = std::fs::read(&ra.path).unwrap();
        let bytes_b = std::fs::read(&rb.path).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }
}

#[test]
fn test_missing_armature_halts_before_writing() {
    let dir = tempdir().expect("Failed to create temp dir");
    let source = dir.path().join("static.glb");
    let mesh = common::body(&common::skeleton());
    common::write_glb(&source, &Armature::default(), &mesh);

    let out = dir.path().join("Hands");
    let err = export_limbs(&source, &ExportOptions::new(&out)).unwrap_err();

    assert!(matches!(err, RigError::MissingArmatureOrMesh(_)));
    assert!(!out.exists());
}

#[test]
fn test_missing_mesh_halts_before_writing() {
    let dir = tempdir().expect("Failed to create temp dir");
    let source = dir.path().join("rig.glb");
    common::write_glb(&source, &common::skeleton(), &Mesh::default());

    let out = dir.path().join("Hands");
    let err = export_limbs(&source, &ExportOptions::new(&out)).unwrap_err();

    assert!(matches!(err, RigError::MissingArmatureOrMesh(_)));
    assert!(!out.exists());
}

#[test]
fn test_missing_source_is_import_error() {
    let dir = tempdir().expect("Failed to create temp dir");
    let err = export_limbs(
        &dir.path().join("nope.glb"),
        &ExportOptions::new(dir.path().join("Hands")),
    )
    .unwrap_err();
    assert!(matches!(err, RigError::Import { .. }));
}

#[test]
fn test_single_side() {
    let dir = tempdir().expect("Failed to create temp dir");
    let source = common::write_source(dir.path());
    let out = dir.path().join("Hands");

    let mut options = ExportOptions::new(&out);
    options.profiles.retain(|p| p.side == Side::Right);
    let reports = export_limbs(&source, &options).expect("Export failed");

    assert_eq!(reports.len(), 1);
    assert!(!out.join("left_hand_elbow.glb").exists());
    assert!(out.join("right_hand_elbow.glb").exists());
}
