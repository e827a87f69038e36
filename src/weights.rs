//! Vertex trimming by skin weight, and vertex-group pruning.

use std::collections::HashSet;

use tracing::debug;

use crate::scene::{DeformVertex, Mesh, VertexGroup};

/// Vertices at or below this summed weight over the allowed groups are dropped.
pub const DEFAULT_MIN_WEIGHT: f32 = 0.0001;

/// Summed weight of `entries` over the groups whose name is in `allowed`.
pub fn allowed_weight(
    entries: &[(usize, f32)],
    groups: &[VertexGroup],
    allowed: &HashSet<String>,
) -> f32 {
    entries
        .iter()
        .filter(|(g, _)| groups.get(*g).is_some_and(|group| allowed.contains(&group.name)))
        .map(|(_, w)| w)
        .sum()
}

pub fn survives(weight: f32, min_weight: f32) -> bool {
    weight > min_weight
}

/// Deletes every vertex whose allowed weight is `<= min_weight`, along with
/// every triangle that used it. Survivors keep their relative order.
///
/// Returns the number of deleted vertices.
pub fn trim_mesh_by_weights(mesh: &mut Mesh, allowed: &HashSet<String>, min_weight: f32) -> usize {
    let keep: Vec<bool> = mesh
        .deform
        .iter()
        .map(|entries| survives(allowed_weight(entries, &mesh.vertex_groups, allowed), min_weight))
        .collect();

    let deleted = keep.iter().filter(|k| !**k).count();
    if deleted == 0 {
        return 0;
    }

    let mut remap: Vec<Option<u32>> = vec![None; keep.len()];
    let mut next = 0u32;
    for (i, &k) in keep.iter().enumerate() {
        if k {
            remap[i] = Some(next);
            next += 1;
        }
    }

    mesh.indices = mesh
        .indices
        .chunks_exact(3)
        .filter_map(|tri| {
            let a = remap.get(tri[0] as usize).copied().flatten()?;
            let b = remap.get(tri[1] as usize).copied().flatten()?;
            let c = remap.get(tri[2] as usize).copied().flatten()?;
            Some([a, b, c])
        })
        .flatten()
        .collect();

    retain_by_mask(&mut mesh.positions, &keep);
    retain_by_mask(&mut mesh.deform, &keep);
    if let Some(normals) = &mut mesh.normals {
        retain_by_mask(normals, &keep);
    }
    if let Some(uvs) = &mut mesh.uvs {
        retain_by_mask(uvs, &keep);
    }

    debug!(
        "Trimmed {} vertices, {} remain",
        deleted,
        mesh.vertex_count()
    );
    deleted
}

fn retain_by_mask<T>(items: &mut Vec<T>, keep: &[bool]) {
    let mut mask = keep.iter();
    items.retain(|_| mask.next().copied().unwrap_or(false));
}

/// Removes every vertex group not named in `allowed`, together with its
/// deform entries. Remaining group indices are renumbered.
///
/// Returns the number of removed groups.
pub fn prune_vertex_groups(mesh: &mut Mesh, allowed: &HashSet<String>) -> usize {
    let mut remap: Vec<Option<usize>> = Vec::with_capacity(mesh.vertex_groups.len());
    let mut next = 0;
    for group in &mesh.vertex_groups {
        if allowed.contains(&group.name) {
            remap.push(Some(next));
            next += 1;
        } else {
            remap.push(None);
        }
    }

    let removed = mesh.vertex_groups.len() - next;
    mesh.vertex_groups.retain(|g| allowed.contains(&g.name));

    for vertex in &mut mesh.deform {
        *vertex = vertex
            .iter()
            .filter_map(|&(g, w)| remap.get(g).copied().flatten().map(|g| (g, w)))
            .collect::<DeformVertex>();
    }

    removed
}
