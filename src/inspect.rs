//! Read-only scene dump: objects, bones, vertex groups.

use std::fmt::Write as _;

use serde::Serialize;

use crate::scene::{ObjectKind, Scene};

pub const DEFAULT_MAX_GROUPS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEntry {
    pub name: String,
    pub kind: ObjectKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArmatureEntry {
    pub name: String,
    pub bones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshEntry {
    pub name: String,
    pub vertex_group_count: usize,
    /// First `max_groups` names only
    pub vertex_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub objects: Vec<ObjectEntry>,
    pub armatures: Vec<ArmatureEntry>,
    pub meshes: Vec<MeshEntry>,
}

pub fn inspect_scene(scene: &Scene, max_groups: usize) -> InspectReport {
    let objects = scene
        .objects()
        .iter()
        .map(|o| ObjectEntry {
            name: o.name.clone(),
            kind: o.kind(),
        })
        .collect();

    let armatures = scene
        .objects_of(ObjectKind::Armature)
        .filter_map(|o| {
            o.armature().map(|a| ArmatureEntry {
                name: o.name.clone(),
                bones: a.bones.iter().map(|b| b.name.clone()).collect(),
            })
        })
        .collect();

    let meshes = scene
        .objects_of(ObjectKind::Mesh)
        .filter_map(|o| {
            o.mesh().map(|m| MeshEntry {
                name: o.name.clone(),
                vertex_group_count: m.vertex_groups.len(),
                vertex_groups: m
                    .vertex_groups
                    .iter()
                    .take(max_groups)
                    .map(|g| g.name.clone())
                    .collect(),
            })
        })
        .collect();

    InspectReport {
        objects,
        armatures,
        meshes,
    }
}

impl InspectReport {
    /// Console listing, one record per line.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = writeln!(out, "OBJECTS:");
        for object in &self.objects {
            let _ = writeln!(out, "{} {}", object.name, object.kind.label());
        }
        for armature in &self.armatures {
            let _ = writeln!(out, "ARMATURE {}", armature.name);
            for bone in &armature.bones {
                let _ = writeln!(out, "BONE {}", bone);
            }
        }
        for mesh in &self.meshes {
            let _ = writeln!(out, "MESH {} vgs= {}", mesh.name, mesh.vertex_group_count);
            for group in &mesh.vertex_groups {
                let _ = writeln!(out, "VG {}", group);
            }
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
