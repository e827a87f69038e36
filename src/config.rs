//! Optional TOML config for the limb exporter.
//!
//! Every key may be omitted; defaults reproduce the Mixamo hand/elbow cut.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, RigError};
use crate::limb::{ExportOptions, LimbProfile, Side, DEFAULT_BONE_PREFIX};
use crate::weights::DEFAULT_MIN_WEIGHT;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub source: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub bone_prefix: Option<String>,
    pub min_weight: Option<f32>,
    #[serde(default)]
    pub left: SideConfig,
    #[serde(default)]
    pub right: SideConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SideConfig {
    pub keep_bones: Option<Vec<String>>,
    pub allowed_groups: Option<Vec<String>>,
    pub output: Option<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("hands")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| RigError::io(path, e))?;
    parse_config(&content, path)
}

pub fn parse_config(content: &str, path: &Path) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(|e| RigError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if let Some(w) = config.min_weight {
        if !w.is_finite() || w < 0.0 {
            return Err(RigError::Config {
                path: path.to_path_buf(),
                message: format!("min_weight must be a non-negative number, got {}", w),
            });
        }
    }
    Ok(config)
}

impl Config {
    pub fn side(&self, side: Side) -> &SideConfig {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn profile(&self, side: Side) -> LimbProfile {
        let prefix = self.bone_prefix.as_deref().unwrap_or(DEFAULT_BONE_PREFIX);
        let mut profile = LimbProfile::new(side, prefix);
        let overrides = self.side(side);
        if let Some(bones) = &overrides.keep_bones {
            profile.keep_bones = bones.iter().cloned().collect();
        }
        if let Some(groups) = &overrides.allowed_groups {
            profile.allowed_groups = groups.iter().cloned().collect();
        }
        if let Some(output) = &overrides.output {
            profile.output = output.clone();
        }
        profile
    }

    /// Export options for `sides`, with CLI values taking precedence.
    pub fn export_options(
        &self,
        sides: &[Side],
        output_dir: Option<PathBuf>,
        min_weight: Option<f32>,
    ) -> ExportOptions {
        ExportOptions {
            output_dir: output_dir
                .or_else(|| self.output_dir.clone())
                .unwrap_or_else(default_output_dir),
            profiles: sides.iter().map(|&side| self.profile(side)).collect(),
            min_weight: min_weight.or(self.min_weight).unwrap_or(DEFAULT_MIN_WEIGHT),
        }
    }
}
