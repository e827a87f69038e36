use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RigError>;

#[derive(Debug, Error)]
pub enum RigError {
    #[error("failed to load glTF {path:?}")]
    Import {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("armature or mesh not found in source {0:?}")]
    MissingArmatureOrMesh(PathBuf),

    #[error("object '{0}' not found in scene")]
    ObjectNotFound(String),

    #[error("object '{name}' is not {expected}")]
    WrongObjectKind { name: String, expected: &'static str },

    #[error("mesh '{mesh}' is not bound to armature '{armature}'")]
    ModifierMismatch { mesh: String, armature: String },

    #[error("failed to serialize glTF document")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid config {path:?}: {message}")]
    Config { path: PathBuf, message: String },
}

impl RigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RigError::Io {
            path: path.into(),
            source,
        }
    }
}
