//! glTF/GLB → [`Scene`]
//!
//! Skins become armature objects, mesh nodes become mesh objects (skinned
//! meshes get vertex groups named after the skin's joints plus an armature
//! modifier), and every other non-joint node becomes an empty.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use glam::Mat4;
use tracing::{debug, warn};

use crate::error::{Result, RigError};
use crate::scene::{
    Armature, Bone, DeformVertex, Mesh, Modifier, ObjectData, Scene, SceneObject, Transform,
    VertexGroup, IDENTITY_MAT4,
};

/// Load a glTF/GLB file into a fresh scene.
pub fn import_scene(path: &Path) -> Result<Scene> {
    let (document, buffers, _images) = gltf::import(path).map_err(|source| RigError::Import {
        path: path.to_path_buf(),
        source,
    })?;
    let scene = build_scene(&document, &buffers);
    debug!("Imported {:?}: {} objects", path, scene.objects().len());
    Ok(scene)
}

/// Same as [`import_scene`], from GLB bytes already in memory.
pub fn import_slice(bytes: &[u8]) -> Result<Scene> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).map_err(|source| RigError::Import {
            path: "<memory>".into(),
            source,
        })?;
    Ok(build_scene(&document, &buffers))
}

struct NodeGraph {
    parent: Vec<Option<usize>>,
    world: Vec<Mat4>,
}

impl NodeGraph {
    fn new(document: &gltf::Document) -> Self {
        let count = document.nodes().count();
        let mut parent = vec![None; count];
        for node in document.nodes() {
            for child in node.children() {
                parent[child.index()] = Some(node.index());
            }
        }

        let local: Vec<Mat4> = document
            .nodes()
            .map(|n| Mat4::from_cols_array_2d(&n.transform().matrix()))
            .collect();

        let mut world: Vec<Option<Mat4>> = vec![None; count];
        for index in 0..count {
            resolve_world(index, &parent, &local, &mut world);
        }

        NodeGraph {
            parent,
            world: world.into_iter().map(|m| m.unwrap_or(Mat4::IDENTITY)).collect(),
        }
    }
}

fn resolve_world(
    index: usize,
    parent: &[Option<usize>],
    local: &[Mat4],
    world: &mut [Option<Mat4>],
) -> Mat4 {
    if let Some(m) = world[index] {
        return m;
    }
    let m = match parent[index] {
        Some(p) => resolve_world(p, parent, local, world) * local[index],
        None => local[index],
    };
    world[index] = Some(m);
    m
}

fn joint_name(node: &gltf::Node, joint: usize) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("joint_{}", joint))
}

/// Armature built from one skin, not yet added to the scene.
struct PendingArmature {
    anchor: Option<usize>,
    object: SceneObject,
    group_names: Vec<String>,
}

fn read_armature(
    skin: &gltf::Skin,
    graph: &NodeGraph,
    all_joints: &HashSet<usize>,
    buffers: &[gltf::buffer::Data],
) -> PendingArmature {
    let joints: Vec<gltf::Node> = skin.joints().collect();
    let joint_of: HashMap<usize, usize> = joints
        .iter()
        .enumerate()
        .map(|(i, n)| (n.index(), i))
        .collect();

    // nearest ancestor that is a joint of this skin
    let parents: Vec<Option<usize>> = joints
        .iter()
        .map(|node| {
            let mut cursor = graph.parent[node.index()];
            while let Some(p) = cursor {
                if let Some(&j) = joint_of.get(&p) {
                    return Some(j);
                }
                cursor = graph.parent[p];
            }
            None
        })
        .collect();

    let root_parents: HashSet<Option<usize>> = joints
        .iter()
        .zip(&parents)
        .filter(|(_, p)| p.is_none())
        .map(|(n, _)| graph.parent[n.index()])
        .collect();
    let anchor = match root_parents.into_iter().collect::<Vec<_>>().as_slice() {
        [Some(node)] if !all_joints.contains(node) => Some(*node),
        _ => None,
    };

    let armature_world = anchor.map(|a| graph.world[a]).unwrap_or(Mat4::IDENTITY);

    let inverse_binds: Vec<[f32; 16]> = skin
        .reader(|buffer| Some(buffers[buffer.index()].0.as_slice()))
        .read_inverse_bind_matrices()
        .map(|iter| {
            iter.map(|m| Mat4::from_cols_array_2d(&m).to_cols_array())
                .collect()
        })
        .unwrap_or_default();

    let bones = joints
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let parent_world = parents[i]
                .map(|p| graph.world[joints[p].index()])
                .unwrap_or(armature_world);
            let local = parent_world.inverse() * graph.world[node.index()];
            Bone {
                name: joint_name(node, i),
                parent: parents[i],
                rest: Transform::from_matrix(local),
                inverse_bind: inverse_binds.get(i).copied().unwrap_or(IDENTITY_MAT4),
            }
        })
        .collect::<Vec<_>>();

    let name = skin
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| "Armature".to_string());

    let group_names = bones.iter().map(|b| b.name.clone()).collect();

    PendingArmature {
        anchor,
        object: SceneObject {
            name,
            transform: Transform::from_matrix(armature_world),
            data: ObjectData::Armature(Armature { bones }),
        },
        group_names,
    }
}

fn add_influence(vertex: &mut DeformVertex, group: usize, weight: f32) {
    match vertex.iter_mut().find(|(g, _)| *g == group) {
        Some((_, w)) => *w += weight,
        None => vertex.push((group, weight)),
    }
}

fn read_mesh(
    mesh: &gltf::Mesh,
    joint_count: Option<usize>,
    buffers: &[gltf::buffer::Data],
) -> Mesh {
    let mut out = Mesh::default();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut has_normals = true;
    let mut has_uvs = true;

    for primitive in mesh.primitives() {
        let points = match primitive.mode() {
            gltf::mesh::Mode::Triangles => false,
            gltf::mesh::Mode::Points => true,
            mode => {
                warn!(
                    "Skipping {:?} primitive in mesh '{}'",
                    mode,
                    mesh.name().unwrap_or("unnamed")
                );
                continue;
            }
        };

        let reader = primitive.reader(|buffer| Some(buffers[buffer.index()].0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            warn!(
                "Skipping primitive without positions in mesh '{}'",
                mesh.name().unwrap_or("unnamed")
            );
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let base = out.positions.len() as u32;
        let count = positions.len();

        match reader.read_normals() {
            Some(iter) => normals.extend(iter),
            None => has_normals = false,
        }
        match reader.read_tex_coords(0) {
            Some(iter) => uvs.extend(iter.into_f32()),
            None => has_uvs = false,
        }

        let mut indices: Vec<u32> = match reader.read_indices() {
            _ if points => Vec::new(),
            Some(iter) => iter.into_u32().map(|i| i + base).collect(),
            None => (base..base + count as u32).collect(),
        };
        indices.truncate(indices.len() - indices.len() % 3);

        let mut deform: Vec<DeformVertex> = vec![Vec::new(); count];
        if let Some(joint_count) = joint_count {
            let mut set = 0;
            while let (Some(joints), Some(weights)) =
                (reader.read_joints(set), reader.read_weights(set))
            {
                for (vertex, (j, w)) in deform
                    .iter_mut()
                    .zip(joints.into_u16().zip(weights.into_f32()))
                {
                    for k in 0..4 {
                        let joint = j[k] as usize;
                        if w[k] > 0.0 && joint < joint_count {
                            add_influence(vertex, joint, w[k]);
                        }
                    }
                }
                set += 1;
            }
        }

        out.positions.extend(positions);
        out.indices.extend(indices);
        out.deform.extend(deform);
    }

    let vertex_count = out.positions.len();
    if has_normals && normals.len() == vertex_count && vertex_count > 0 {
        out.normals = Some(normals);
    }
    if has_uvs && uvs.len() == vertex_count && vertex_count > 0 {
        out.uvs = Some(uvs);
    }
    out
}

fn build_scene(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Scene {
    let graph = NodeGraph::new(document);
    let node_names: Vec<Option<String>> = document
        .nodes()
        .map(|n| n.name().map(str::to_string))
        .collect();

    let all_joints: HashSet<usize> = document
        .skins()
        .flat_map(|s| s.joints().map(|n| n.index()).collect::<Vec<_>>())
        .collect();

    // anchored armatures take the name of their anchor node
    let mut armatures: Vec<PendingArmature> = document
        .skins()
        .map(|skin| read_armature(&skin, &graph, &all_joints, buffers))
        .collect();
    for armature in &mut armatures {
        if let Some(name) = armature.anchor.and_then(|a| node_names[a].clone()) {
            armature.object.name = name;
        }
    }

    let mut scene = Scene::new();
    let mut skin_objects: Vec<Option<String>> = vec![None; armatures.len()];
    let mut bindings: Vec<(String, usize)> = Vec::new();

    for node in document.nodes() {
        let index = node.index();
        for (skin, armature) in armatures.iter().enumerate() {
            if armature.anchor == Some(index) {
                skin_objects[skin] = Some(scene.add(armature.object.clone()));
            }
        }
        if armatures.iter().any(|a| a.anchor == Some(index)) && node.mesh().is_none() {
            continue;
        }

        let transform = Transform::from_matrix(graph.world[index]);
        if let Some(mesh) = node.mesh() {
            let skin = node.skin().map(|s| s.index());
            let joint_count = skin.map(|s| armatures[s].group_names.len());
            let mut data = read_mesh(&mesh, joint_count, buffers);
            if let Some(s) = skin {
                data.vertex_groups = armatures[s]
                    .group_names
                    .iter()
                    .map(|name| VertexGroup { name: name.clone() })
                    .collect();
            }
            let name = node
                .name()
                .or_else(|| mesh.name())
                .unwrap_or("Mesh")
                .to_string();
            let name = scene.add(SceneObject {
                name,
                transform,
                data: ObjectData::Mesh(data),
            });
            if let Some(s) = skin {
                bindings.push((name, s));
            }
        } else if !all_joints.contains(&index) {
            scene.add(SceneObject {
                name: node.name().unwrap_or("Empty").to_string(),
                transform,
                data: ObjectData::Empty,
            });
        }
    }

    for (skin, armature) in armatures.iter().enumerate() {
        if skin_objects[skin].is_none() {
            skin_objects[skin] = Some(scene.add(armature.object.clone()));
        }
    }

    for (mesh_name, skin) in bindings {
        if let (Some(object), Ok(mesh)) = (skin_objects[skin].clone(), scene.mesh_mut(&mesh_name)) {
            mesh.modifiers.push(Modifier::Armature {
                name: "Armature".to_string(),
                object,
            });
        }
    }

    scene
}
