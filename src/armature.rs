//! Bone pruning

use std::collections::HashSet;

use glam::Mat4;
use tracing::debug;

use crate::scene::{Armature, Bone, Transform};

/// Removes every bone whose name is not in `keep` (exact, case-sensitive).
///
/// All removals happen in one pass. A kept bone whose parent is removed is
/// attached to its nearest kept ancestor, or becomes a root, and its local
/// rest transform is recomposed so it stays put in armature space.
///
/// Returns the number of bones removed.
pub fn keep_only_bones(armature: &mut Armature, keep: &HashSet<String>) -> usize {
    let bones = &armature.bones;
    let kept: Vec<bool> = bones.iter().map(|b| keep.contains(&b.name)).collect();

    let mut remap = vec![None; bones.len()];
    let mut next = 0;
    for (i, &k) in kept.iter().enumerate() {
        if k {
            remap[i] = Some(next);
            next += 1;
        }
    }

    let armature_space: Vec<Mat4> = (0..bones.len())
        .map(|i| armature.armature_space(i))
        .collect();

    let pruned: Vec<Bone> = bones
        .iter()
        .enumerate()
        .filter(|(i, _)| kept[*i])
        .map(|(i, bone)| {
            let mut parent = bone.parent;
            while let Some(p) = parent {
                if kept[p] {
                    break;
                }
                parent = bones[p].parent;
            }

            let rest = if parent == bone.parent {
                bone.rest
            } else {
                let parent_space = parent.map(|p| armature_space[p]).unwrap_or(Mat4::IDENTITY);
                Transform::from_matrix(parent_space.inverse() * armature_space[i])
            };

            Bone {
                name: bone.name.clone(),
                parent: parent.and_then(|p| remap[p]),
                rest,
                inverse_bind: bone.inverse_bind,
            }
        })
        .collect();

    let removed = bones.len() - pruned.len();
    debug!("Kept {} bones, removed {}", pruned.len(), removed);
    armature.bones = pruned;
    removed
}
