//! Synthetic Mixamo-style character for integration tests.
//!
//! Skeleton: Hips -> Spine -> {Neck -> Head, Left/Right arm chains down to
//! the index finger and thumb}. The body mesh has one quad per bone weighted fully to that
//! bone, plus two blended quads on the left arm.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use glam::Vec3;
use limb_rigger::export::{assemble_glb, build_document};
use limb_rigger::scene::{Armature, Bone, Mesh, Transform, VertexGroup};

pub const PREFIX: &str = "mixamorig:";

const ARM_CHAIN: [&str; 8] = [
    "Shoulder",
    "Arm",
    "ForeArm",
    "Hand",
    "HandIndex1",
    "HandIndex2",
    "HandIndex3",
    "HandThumb1",
];

pub fn bone_name(name: &str) -> String {
    format!("{}{}", PREFIX, name)
}

fn push(bones: &mut Vec<Bone>, name: String, parent: Option<usize>, offset: [f32; 3]) -> usize {
    bones.push(Bone {
        name,
        parent,
        rest: Transform {
            translation: offset,
            ..Transform::IDENTITY
        },
        inverse_bind: [0.0; 16],
    });
    bones.len() - 1
}

pub fn skeleton() -> Armature {
    let mut bones = Vec::new();

    let hips = push(&mut bones, bone_name("Hips"), None, [0.0, 1.0, 0.0]);
    let spine = push(&mut bones, bone_name("Spine"), Some(hips), [0.0, 0.3, 0.0]);
    let neck = push(&mut bones, bone_name("Neck"), Some(spine), [0.0, 0.3, 0.0]);
    push(&mut bones, bone_name("Head"), Some(neck), [0.0, 0.1, 0.0]);

    for (side, dir) in [("Left", 1.0f32), ("Right", -1.0f32)] {
        let mut parent = spine;
        for (i, part) in ARM_CHAIN.iter().enumerate() {
            // thumb hangs off the hand, not the index finger
            let (parent_bone, offset) = if *part == "HandThumb1" {
                (parent - 3, [dir * 0.02, 0.0, 0.02])
            } else {
                (parent, [dir * (0.1 + i as f32 * 0.05), 0.0, 0.0])
            };
            parent = push(
                &mut bones,
                bone_name(&format!("{}{}", side, part)),
                Some(parent_bone),
                offset,
            );
        }
    }

    let mut armature = Armature { bones };
    for i in 0..armature.bones.len() {
        armature.bones[i].inverse_bind = armature.armature_space(i).inverse().to_cols_array();
    }
    armature
}

fn push_quad(mesh: &mut Mesh, origin: Vec3, weights: Vec<(usize, f32)>) {
    let base = mesh.positions.len() as u32;
    for corner in [Vec3::ZERO, Vec3::X * 0.05, Vec3::Y * 0.05, Vec3::new(0.05, 0.05, 0.0)] {
        mesh.positions.push((origin + corner).to_array());
        mesh.deform.push(weights.clone());
    }
    mesh.normals
        .get_or_insert_with(Vec::new)
        .extend([[0.0, 0.0, 1.0]; 4]);
    mesh.indices
        .extend([base, base + 1, base + 2, base + 2, base + 1, base + 3]);
}

pub fn body(armature: &Armature) -> Mesh {
    let mut mesh = Mesh {
        vertex_groups: armature
            .bones
            .iter()
            .map(|b| VertexGroup {
                name: b.name.clone(),
            })
            .collect(),
        ..Default::default()
    };

    for i in 0..armature.bones.len() {
        let origin = armature.armature_space(i).w_axis.truncate();
        push_quad(&mut mesh, origin, vec![(i, 1.0)]);
    }

    let group = |name: &str| armature.bone_index(&bone_name(name)).unwrap();
    // elbow: half upper arm, half forearm -> kept
    push_quad(
        &mut mesh,
        Vec3::new(0.3, 1.3, 0.1),
        vec![(group("LeftArm"), 0.5), (group("LeftForeArm"), 0.5)],
    );
    // upper arm with a trace of hand weight -> dropped
    push_quad(
        &mut mesh,
        Vec3::new(0.2, 1.3, 0.1),
        vec![(group("LeftArm"), 0.99995), (group("LeftHand"), 0.00005)],
    );
    mesh
}

/// Per-bone quads that survive a side's cut (ForeArm, Hand, HandIndex1/2).
pub const KEPT_BONE_QUADS: usize = 4;

pub fn write_glb(path: &Path, armature: &Armature, mesh: &Mesh) {
    let (root, data) = build_document(
        "Body",
        &Transform::IDENTITY,
        mesh,
        "Armature",
        &Transform::IDENTITY,
        armature,
    );
    let glb = assemble_glb(&root, &data).expect("Failed to assemble GLB");
    std::fs::write(path, glb).expect("Failed to write GLB");
}

/// Writes the test character to `dir/idle.glb`.
pub fn write_source(dir: &Path) -> PathBuf {
    let armature = skeleton();
    let mesh = body(&armature);
    let path = dir.join("idle.glb");
    write_glb(&path, &armature, &mesh);
    path
}
