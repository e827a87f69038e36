//! In-memory scene: the document every import, edit and export works on.
//!
//! Objects are kept in insertion order and their names are unique within a
//! scene. Edits mutate objects in place; nothing here touches the disk.

use glam::{Mat4, Quat, Vec3};
use serde::Serialize;

use crate::error::{Result, RigError};

pub const IDENTITY_MAT4: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

/// Local translation / rotation / scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    /// Quaternion, xyzw
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0; 3],
    };

    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Transform {
            translation: translation.to_array(),
            rotation: rotation.normalize().to_array(),
            scale: scale.to_array(),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from_array(self.scale),
            Quat::from_array(self.rotation),
            Vec3::from_array(self.translation),
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Transform::IDENTITY
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Index into the owning armature's bone list
    pub parent: Option<usize>,
    /// Rest pose relative to the parent bone, or to the armature object for roots
    pub rest: Transform,
    /// Column-major
    pub inverse_bind: [f32; 16],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Armature {
    pub bones: Vec<Bone>,
}

impl Armature {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Rest matrix of a bone in armature space.
    pub fn armature_space(&self, index: usize) -> Mat4 {
        let bone = &self.bones[index];
        match bone.parent {
            Some(parent) => self.armature_space(parent) * bone.rest.matrix(),
            None => bone.rest.matrix(),
        }
    }

    /// Children of `index`, in bone order.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.parent == Some(index))
            .map(|(i, _)| i)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexGroup {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    /// Deform the mesh with the named armature object
    Armature { name: String, object: String },
}

/// Per-vertex `(vertex group index, weight)` pairs.
pub type DeformVertex = Vec<(usize, f32)>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    /// Triangle list
    pub indices: Vec<u32>,
    pub vertex_groups: Vec<VertexGroup>,
    /// One entry per vertex
    pub deform: Vec<DeformVertex>,
    pub modifiers: Vec<Modifier>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.vertex_groups.iter().position(|g| g.name == name)
    }

    pub fn armature_modifier(&self) -> Option<&str> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Armature { object, .. } => Some(object.as_str()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    Armature(Armature),
    Mesh(Mesh),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    Armature,
    Mesh,
    Empty,
}

impl ObjectKind {
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Armature => "ARMATURE",
            ObjectKind::Mesh => "MESH",
            ObjectKind::Empty => "EMPTY",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub transform: Transform,
    pub data: ObjectData,
}

impl SceneObject {
    pub fn kind(&self) -> ObjectKind {
        match self.data {
            ObjectData::Armature(_) => ObjectKind::Armature,
            ObjectData::Mesh(_) => ObjectKind::Mesh,
            ObjectData::Empty => ObjectKind::Empty,
        }
    }

    pub fn armature(&self) -> Option<&Armature> {
        match &self.data {
            ObjectData::Armature(a) => Some(a),
            _ => None,
        }
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.data {
            ObjectData::Mesh(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Scene {
            objects: Vec::new(),
        }
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_of(&self, kind: ObjectKind) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(move |o| o.kind() == kind)
    }

    /// Adds `object`, renaming it `Name.001`, `Name.002`, ... if the name is taken.
    /// Returns the name it was stored under.
    pub fn add(&mut self, mut object: SceneObject) -> String {
        object.name = self.unique_name(&object.name);
        let name = object.name.clone();
        self.objects.push(object);
        name
    }

    fn unique_name(&self, wanted: &str) -> String {
        if self.get(wanted).is_none() {
            return wanted.to_string();
        }
        (1..)
            .map(|n| format!("{}.{:03}", wanted, n))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or_else(|| wanted.to_string())
    }

    pub fn get(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    pub fn first_armature(&self) -> Option<&SceneObject> {
        self.objects_of(ObjectKind::Armature).next()
    }

    pub fn first_mesh(&self) -> Option<&SceneObject> {
        self.objects_of(ObjectKind::Mesh).next()
    }

    pub fn armature(&self, name: &str) -> Result<&Armature> {
        let object = self
            .get(name)
            .ok_or_else(|| RigError::ObjectNotFound(name.to_string()))?;
        object.armature().ok_or_else(|| RigError::WrongObjectKind {
            name: name.to_string(),
            expected: "an armature",
        })
    }

    pub fn armature_mut(&mut self, name: &str) -> Result<&mut Armature> {
        let object = self
            .get_mut(name)
            .ok_or_else(|| RigError::ObjectNotFound(name.to_string()))?;
        match &mut object.data {
            ObjectData::Armature(a) => Ok(a),
            _ => Err(RigError::WrongObjectKind {
                name: name.to_string(),
                expected: "an armature",
            }),
        }
    }

    pub fn mesh(&self, name: &str) -> Result<&Mesh> {
        let object = self
            .get(name)
            .ok_or_else(|| RigError::ObjectNotFound(name.to_string()))?;
        object.mesh().ok_or_else(|| RigError::WrongObjectKind {
            name: name.to_string(),
            expected: "a mesh",
        })
    }

    pub fn mesh_mut(&mut self, name: &str) -> Result<&mut Mesh> {
        let object = self
            .get_mut(name)
            .ok_or_else(|| RigError::ObjectNotFound(name.to_string()))?;
        match &mut object.data {
            ObjectData::Mesh(m) => Ok(m),
            _ => Err(RigError::WrongObjectKind {
                name: name.to_string(),
                expected: "a mesh",
            }),
        }
    }

    /// Copies object `source` and its data under `new_name`. The copy shares
    /// nothing with the original.
    pub fn duplicate_object(&mut self, source: &str, new_name: &str) -> Result<String> {
        let mut copy = self
            .get(source)
            .cloned()
            .ok_or_else(|| RigError::ObjectNotFound(source.to_string()))?;
        copy.name = new_name.to_string();
        Ok(self.add(copy))
    }
}
