//! limb-rigger
//!
//! Loads a skinned character (glTF/GLB), cuts it down to one arm's bones and
//! the vertices weighted to them, and writes each side out as its own GLB.
//! Also provides a read-only inspector for the source asset.

pub mod armature;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod inspect;
pub mod limb;
pub mod scene;
pub mod weights;

pub use error::{Result, RigError};
pub use export::{export_pair, ExportStats};
pub use import::{import_scene, import_slice};
pub use inspect::{inspect_scene, InspectReport};
pub use limb::{build_side, export_limbs, ExportOptions, LimbProfile, Side, SideReport};
pub use scene::Scene;
