//! Per-side limb extraction: duplicate, prune, trim, rebind, export.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::armature::keep_only_bones;
use crate::error::{Result, RigError};
use crate::export::export_pair;
use crate::import::import_scene;
use crate::scene::{Mesh, Modifier, Scene};
use crate::weights::{prune_vertex_groups, trim_mesh_by_weights, DEFAULT_MIN_WEIGHT};

pub const DEFAULT_BONE_PREFIX: &str = "mixamorig:";

/// Bones kept on each side: shoulder down to the first two index-finger joints.
const KEEP_BONES: [&str; 6] = ["Shoulder", "Arm", "ForeArm", "Hand", "HandIndex1", "HandIndex2"];

/// Weight channels that keep a vertex alive.
const ALLOWED_GROUPS: [&str; 4] = ["ForeArm", "Hand", "HandIndex1", "HandIndex2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn title(self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }

    pub fn default_output(self) -> &'static str {
        match self {
            Side::Left => "left_hand_elbow.glb",
            Side::Right => "right_hand_elbow.glb",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Everything that differs between the left and right export.
#[derive(Debug, Clone, PartialEq)]
pub struct LimbProfile {
    pub side: Side,
    pub keep_bones: HashSet<String>,
    pub allowed_groups: HashSet<String>,
    /// File name inside the output directory
    pub output: String,
    pub armature_name: String,
    pub mesh_name: String,
}

impl LimbProfile {
    /// Mixamo-style names: `<prefix><Left|Right><Bone>`.
    pub fn new(side: Side, bone_prefix: &str) -> Self {
        let qualify = |bone: &&str| format!("{}{}{}", bone_prefix, side.title(), bone);
        LimbProfile {
            side,
            keep_bones: KEEP_BONES.iter().map(qualify).collect(),
            allowed_groups: ALLOWED_GROUPS.iter().map(qualify).collect(),
            output: side.default_output().to_string(),
            armature_name: format!("{}Armature", side.title()),
            mesh_name: format!("{}HandMesh", side.title()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideReport {
    pub side: Side,
    pub path: PathBuf,
    pub bones: usize,
    pub vertices: usize,
    pub vertex_groups: usize,
    pub removed_bones: usize,
    pub removed_vertices: usize,
}

/// First armature and first mesh in scene order.
pub fn find_main_objects(scene: &Scene, source: &Path) -> Result<(String, String)> {
    match (scene.first_armature(), scene.first_mesh()) {
        (Some(armature), Some(mesh)) => Ok((armature.name.clone(), mesh.name.clone())),
        _ => Err(RigError::MissingArmatureOrMesh(source.to_path_buf())),
    }
}

/// Point the mesh's first armature modifier at `armature`, adding one if
/// there is none.
pub fn relink_armature_modifier(mesh: &mut Mesh, armature: &str) {
    let existing = mesh.modifiers.iter_mut().find_map(|m| match m {
        Modifier::Armature { object, .. } => Some(object),
    });
    match existing {
        Some(object) => *object = armature.to_string(),
        None => mesh.modifiers.push(Modifier::Armature {
            name: "Armature".to_string(),
            object: armature.to_string(),
        }),
    }
}

/// Build one side from the base pair and export it into `out_dir`.
pub fn build_side(
    scene: &mut Scene,
    base_armature: &str,
    base_mesh: &str,
    profile: &LimbProfile,
    out_dir: &Path,
    min_weight: f32,
) -> Result<SideReport> {
    let armature_name = scene.duplicate_object(base_armature, &profile.armature_name)?;
    let mesh_name = scene.duplicate_object(base_mesh, &profile.mesh_name)?;
    debug!(
        "{} side: duplicated '{}' -> '{}', '{}' -> '{}'",
        profile.side, base_armature, armature_name, base_mesh, mesh_name
    );

    let removed_bones = keep_only_bones(scene.armature_mut(&armature_name)?, &profile.keep_bones);

    let mesh = scene.mesh_mut(&mesh_name)?;
    let removed_vertices = trim_mesh_by_weights(mesh, &profile.allowed_groups, min_weight);
    prune_vertex_groups(mesh, &profile.allowed_groups);
    relink_armature_modifier(mesh, &armature_name);
    let vertex_groups = mesh.vertex_groups.len();

    let path = out_dir.join(&profile.output);
    let stats = export_pair(scene, &mesh_name, &armature_name, &path)?;
    info!("EXPORTED {}", path.display());

    Ok(SideReport {
        side: profile.side,
        path,
        bones: stats.bones,
        vertices: stats.vertices,
        vertex_groups,
        removed_bones,
        removed_vertices,
    })
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub profiles: Vec<LimbProfile>,
    pub min_weight: f32,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        ExportOptions {
            output_dir: output_dir.into(),
            profiles: Side::BOTH
                .iter()
                .map(|&side| LimbProfile::new(side, DEFAULT_BONE_PREFIX))
                .collect(),
            min_weight: DEFAULT_MIN_WEIGHT,
        }
    }
}

/// Import `source` into a fresh scene and export every profile in order.
///
/// Fails before anything is written when the source has no armature or no mesh.
pub fn export_limbs(source: &Path, options: &ExportOptions) -> Result<Vec<SideReport>> {
    let mut scene = import_scene(source)?;
    let (base_armature, base_mesh) = find_main_objects(&scene, source)?;
    info!(
        "Source {:?}: armature '{}', mesh '{}'",
        source, base_armature, base_mesh
    );

    std::fs::create_dir_all(&options.output_dir)
        .map_err(|e| RigError::io(&options.output_dir, e))?;

    options
        .profiles
        .iter()
        .map(|profile| {
            build_side(
                &mut scene,
                &base_armature,
                &base_mesh,
                profile,
                &options.output_dir,
                options.min_weight,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_names() {
        let left = LimbProfile::new(Side::Left, DEFAULT_BONE_PREFIX);
        assert_eq!(left.keep_bones.len(), 6);
        assert!(left.keep_bones.contains("mixamorig:LeftShoulder"));
        assert!(left.keep_bones.contains("mixamorig:LeftHandIndex2"));
        assert_eq!(left.allowed_groups.len(), 4);
        assert!(!left.allowed_groups.contains("mixamorig:LeftArm"));
        assert!(left.allowed_groups.is_subset(&left.keep_bones));
        assert_eq!(left.output, "left_hand_elbow.glb");
        assert_eq!(left.armature_name, "LeftArmature");

        let right = LimbProfile::new(Side::Right, "");
        assert!(right.keep_bones.contains("RightForeArm"));
        assert_eq!(right.mesh_name, "RightHandMesh");
    }

    #[test]
    fn test_relink_adds_or_repoints() {
        let mut mesh = Mesh::default();
        relink_armature_modifier(&mut mesh, "LeftArmature");
        assert_eq!(mesh.armature_modifier(), Some("LeftArmature"));

        relink_armature_modifier(&mut mesh, "RightArmature");
        assert_eq!(mesh.modifiers.len(), 1);
        assert_eq!(mesh.armature_modifier(), Some("RightArmature"));
    }

    #[test]
    fn test_find_main_objects_on_empty_scene() {
        let scene = Scene::new();
        let err = find_main_objects(&scene, Path::new("idle.glb")).unwrap_err();
        assert!(matches!(err, RigError::MissingArmatureOrMesh(_)));
    }
}
