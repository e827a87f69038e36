//! GLB writer for a selected armature/mesh pair.
//!
//! Layout of the written document:
//! - node 0: the armature object, root bones as its children
//! - nodes 1..=N: bones, in armature order
//! - last node: the mesh object, skinned by skin 0
//!
//! No animation is written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gltf_json as json;
use gltf_json::validation::Checked::Valid;
use itertools::Itertools;
use tracing::{debug, warn};

use crate::error::{Result, RigError};
use crate::scene::{Armature, Mesh, Scene, Transform};

const GENERATOR: &str = concat!("limb-rigger ", env!("CARGO_PKG_VERSION"));

/// Influences per vertex in a single JOINTS_0/WEIGHTS_0 set.
const MAX_INFLUENCES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportStats {
    pub path: PathBuf,
    pub bones: usize,
    pub vertices: usize,
    pub triangles: usize,
}

struct BufferBuilder {
    buffer: Vec<u8>,
    views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
}

impl BufferBuilder {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            views: Vec::new(),
            accessors: Vec::new(),
        }
    }

    fn pack<T: bytemuck::Pod>(
        &mut self,
        data: &[T],
        component: json::accessor::ComponentType,
        type_: json::accessor::Type,
        target: Option<json::buffer::Target>,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> json::Index<json::Accessor> {
        let offset = self.buffer.len();
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.buffer.extend_from_slice(bytes);

        self.views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: bytes.len().into(),
            byte_offset: Some((offset as u64).into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: target.map(Valid),
        });

        let (min, max) = match bounds {
            Some((min, max)) => (
                Some(json::Value::Array(min.into_iter().map(json::Value::from).collect())),
                Some(json::Value::Array(max.into_iter().map(json::Value::from).collect())),
            ),
            None => (None, None),
        };

        self.accessors.push(json::Accessor {
            buffer_view: Some(json::Index::new(self.views.len() as u32 - 1)),
            byte_offset: Some(0u64.into()),
            count: data.len().into(),
            component_type: Valid(json::accessor::GenericComponentType(component)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(type_),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        });

        align_buffer(&mut self.buffer);
        json::Index::new(self.accessors.len() as u32 - 1)
    }
}

pub fn compute_bounds(positions: &[[f32; 3]]) -> (Vec<f32>, Vec<f32>) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];

    for pos in positions {
        for i in 0..3 {
            min[i] = min[i].min(pos[i]);
            max[i] = max[i].max(pos[i]);
        }
    }

    (min.to_vec(), max.to_vec())
}

fn align_buffer(buffer: &mut Vec<u8>) {
    while buffer.len() % 4 != 0 {
        buffer.push(0);
    }
}

/// JSON + BIN chunks wrapped in a GLB container.
pub fn assemble_glb(root: &json::Root, buffer_data: &[u8]) -> Result<Vec<u8>> {
    let json_bytes = serde_json::to_vec(root)?;

    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;

    let buffer_padding = (4 - (buffer_data.len() % 4)) % 4;
    let buffer_chunk_length = buffer_data.len() + buffer_padding;

    let total_length = 12 + 8 + json_chunk_length + 8 + buffer_chunk_length;

    let mut glb = Vec::with_capacity(total_length);

    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes()); // "JSON"
    glb.extend_from_slice(&json_bytes);
    glb.extend(std::iter::repeat(0x20).take(json_padding));

    glb.extend_from_slice(&(buffer_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E4942u32.to_le_bytes()); // "BIN\0"
    glb.extend_from_slice(buffer_data);
    glb.extend(std::iter::repeat(0).take(buffer_padding));

    Ok(glb)
}

fn node(name: &str, transform: &Transform) -> json::Node {
    json::Node {
        camera: None,
        children: None,
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: None,
        name: Some(name.to_string()),
        rotation: Some(json::scene::UnitQuaternion(transform.rotation)),
        scale: Some(transform.scale),
        skin: None,
        translation: Some(transform.translation),
        weights: None,
    }
}

/// Four strongest bone influences of every vertex, renormalised.
///
/// Deform entries whose vertex group has no bone of the same name are
/// dropped. A vertex left with nothing is bound fully to joint 0.
pub fn vertex_influences(mesh: &Mesh, armature: &Armature) -> (Vec<[u16; 4]>, Vec<[f32; 4]>) {
    let group_bone: Vec<Option<u16>> = mesh
        .vertex_groups
        .iter()
        .map(|g| armature.bone_index(&g.name).map(|b| b as u16))
        .collect();

    mesh.deform
        .iter()
        .map(|entries| {
            let strongest: Vec<(u16, f32)> = entries
                .iter()
                .filter_map(|&(g, w)| group_bone.get(g).copied().flatten().map(|b| (b, w)))
                .filter(|(_, w)| *w > 0.0)
                .sorted_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)))
                .take(MAX_INFLUENCES)
                .collect();

            let total: f32 = strongest.iter().map(|(_, w)| w).sum();
            let mut joints = [0u16; 4];
            let mut weights = [0f32; 4];
            if total > 0.0 {
                for (slot, (bone, weight)) in strongest.into_iter().enumerate() {
                    joints[slot] = bone;
                    weights[slot] = weight / total;
                }
            } else {
                weights[0] = 1.0;
            }
            (joints, weights)
        })
        .unzip()
}

/// Build the glTF document and binary buffer for `mesh` skinned to `armature`.
pub fn build_document(
    mesh_name: &str,
    mesh_transform: &Transform,
    mesh: &Mesh,
    armature_name: &str,
    armature_transform: &Transform,
    armature: &Armature,
) -> (json::Root, Vec<u8>) {
    use json::accessor::{ComponentType, Type};
    use json::buffer::Target;

    let mut buffer = BufferBuilder::new();
    let mut nodes = Vec::with_capacity(armature.bones.len() + 2);

    let mut armature_node = node(armature_name, armature_transform);
    let roots: Vec<_> = armature
        .bones
        .iter()
        .positions(|b| b.parent.is_none())
        .map(|i| json::Index::new(i as u32 + 1))
        .collect();
    if !roots.is_empty() {
        armature_node.children = Some(roots);
    }
    nodes.push(armature_node);

    for (i, bone) in armature.bones.iter().enumerate() {
        let mut bone_node = node(&bone.name, &bone.rest);
        let children: Vec<_> = armature
            .children(i)
            .map(|c| json::Index::new(c as u32 + 1))
            .collect();
        if !children.is_empty() {
            bone_node.children = Some(children);
        }
        nodes.push(bone_node);
    }

    let mut skins = Vec::new();
    if !armature.bones.is_empty() {
        let matrices: Vec<[f32; 16]> = armature.bones.iter().map(|b| b.inverse_bind).collect();
        let ibm = buffer.pack(&matrices, ComponentType::F32, Type::Mat4, None, None);
        skins.push(json::Skin {
            extensions: Default::default(),
            extras: Default::default(),
            inverse_bind_matrices: Some(ibm),
            joints: (1..=armature.bones.len() as u32).map(json::Index::new).collect(),
            name: Some(armature_name.to_string()),
            skeleton: Some(json::Index::new(0)),
        });
    }

    let mut meshes = Vec::new();
    let mut scene_roots = vec![json::Index::new(0)];

    if mesh.vertex_count() > 0 {
        let mut attributes = BTreeMap::new();
        let positions = buffer.pack(
            &mesh.positions,
            ComponentType::F32,
            Type::Vec3,
            Some(Target::ArrayBuffer),
            Some(compute_bounds(&mesh.positions)),
        );
        attributes.insert(Valid(json::mesh::Semantic::Positions), positions);

        if let Some(normals) = &mesh.normals {
            let normals = buffer.pack(
                normals,
                ComponentType::F32,
                Type::Vec3,
                Some(Target::ArrayBuffer),
                None,
            );
            attributes.insert(Valid(json::mesh::Semantic::Normals), normals);
        }
        if let Some(uvs) = &mesh.uvs {
            let uvs = buffer.pack(
                uvs,
                ComponentType::F32,
                Type::Vec2,
                Some(Target::ArrayBuffer),
                None,
            );
            attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), uvs);
        }
        if !skins.is_empty() {
            let (joints, weights) = vertex_influences(mesh, armature);
            let target = Some(Target::ArrayBuffer);
            let joints = buffer.pack(&joints, ComponentType::U16, Type::Vec4, target, None);
            let weights = buffer.pack(&weights, ComponentType::F32, Type::Vec4, target, None);
            attributes.insert(Valid(json::mesh::Semantic::Joints(0)), joints);
            attributes.insert(Valid(json::mesh::Semantic::Weights(0)), weights);
        }

        // loose vertices with no faces left are written as a point cloud
        let (indices, mode) = if mesh.indices.is_empty() {
            (None, json::mesh::Mode::Points)
        } else {
            let indices = buffer.pack(
                &mesh.indices,
                ComponentType::U32,
                Type::Scalar,
                Some(Target::ElementArrayBuffer),
                None,
            );
            (Some(indices), json::mesh::Mode::Triangles)
        };

        meshes.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some(mesh_name.to_string()),
            primitives: vec![json::mesh::Primitive {
                attributes,
                extensions: Default::default(),
                extras: Default::default(),
                indices,
                material: None,
                mode: Valid(mode),
                targets: None,
            }],
            weights: None,
        });

        let mut mesh_node = node(mesh_name, mesh_transform);
        mesh_node.mesh = Some(json::Index::new(0));
        if !skins.is_empty() {
            mesh_node.skin = Some(json::Index::new(0));
        }
        scene_roots.push(json::Index::new(nodes.len() as u32));
        nodes.push(mesh_node);
    }

    let buffer_data = buffer.buffer;
    let root = json::Root {
        accessors: buffer.accessors,
        animations: Vec::new(),
        asset: json::Asset {
            copyright: None,
            extensions: Default::default(),
            extras: Default::default(),
            generator: Some(GENERATOR.to_string()),
            min_version: None,
            version: "2.0".to_string(),
        },
        buffers: vec![json::Buffer {
            byte_length: (buffer_data.len() as u64).into(),
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            uri: None,
        }],
        buffer_views: buffer.views,
        cameras: Vec::new(),
        extensions: Default::default(),
        extensions_required: Vec::new(),
        extensions_used: Vec::new(),
        extras: Default::default(),
        images: Vec::new(),
        materials: Vec::new(),
        meshes,
        nodes,
        samplers: Vec::new(),
        scene: Some(json::Index::new(0)),
        scenes: vec![json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some("Scene".to_string()),
            nodes: scene_roots,
        }],
        skins,
        textures: Vec::new(),
    };

    (root, buffer_data)
}

/// Write `mesh_name` and `armature_name` (and nothing else) from `scene` to a
/// GLB file at `path`. The mesh must be bound to that armature.
pub fn export_pair(
    scene: &Scene,
    mesh_name: &str,
    armature_name: &str,
    path: &Path,
) -> Result<ExportStats> {
    let mesh_object = scene
        .get(mesh_name)
        .ok_or_else(|| RigError::ObjectNotFound(mesh_name.to_string()))?;
    let armature_object = scene
        .get(armature_name)
        .ok_or_else(|| RigError::ObjectNotFound(armature_name.to_string()))?;
    let mesh = mesh_object.mesh().ok_or_else(|| RigError::WrongObjectKind {
        name: mesh_name.to_string(),
        expected: "a mesh",
    })?;
    let armature = armature_object
        .armature()
        .ok_or_else(|| RigError::WrongObjectKind {
            name: armature_name.to_string(),
            expected: "an armature",
        })?;

    if mesh.armature_modifier() != Some(armature_name) {
        return Err(RigError::ModifierMismatch {
            mesh: mesh_name.to_string(),
            armature: armature_name.to_string(),
        });
    }
    if mesh.vertex_count() == 0 {
        warn!(
            "Mesh '{}' has no vertices left, exporting armature '{}' alone",
            mesh_name, armature_name
        );
    }

    let (root, buffer_data) = build_document(
        mesh_name,
        &mesh_object.transform,
        mesh,
        armature_name,
        &armature_object.transform,
        armature,
    );
    let glb = assemble_glb(&root, &buffer_data)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RigError::io(parent, e))?;
    }
    std::fs::write(path, &glb).map_err(|e| RigError::io(path, e))?;

    debug!("Wrote {} bytes to {:?}", glb.len(), path);

    Ok(ExportStats {
        path: path.to_path_buf(),
        bones: armature.bones.len(),
        vertices: mesh.vertex_count(),
        triangles: mesh.indices.len() / 3,
    })
}
