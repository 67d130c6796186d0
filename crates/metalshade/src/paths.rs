//! Resolves metalshade's config and data directories, honouring environment
//! overrides, and turns the configured shader directories into the ordered
//! search roots the catalog scans.
//!
//! - `AppPaths::discover` probes the overrides and falls back to the platform
//!   defaults from `directories-next`.
//! - `AppPaths::shader_roots` encodes root precedence: CLI roots replace the
//!   configured ones, otherwise configured roots come first and the data
//!   directory's `shaders/` last.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "METALSHADE_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "METALSHADE_DATA_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "metalshade";
const APPLICATION: &str = "metalshade";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_override = env_override(ENV_CONFIG_DIR);
        let data_override = env_override(ENV_DATA_DIR);
        if let (Some(config_dir), Some(data_dir)) = (&config_override, &data_override) {
            return Ok(Self::new(config_dir.clone(), data_dir.clone()));
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self::new(
            config_override.unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            data_override.unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
        ))
    }

    pub fn new(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn shader_roots(&self, configured: &[PathBuf], cli: &[PathBuf]) -> Vec<PathBuf> {
        if !cli.is_empty() {
            return cli.to_vec();
        }
        let mut roots = configured.to_vec();
        let installed = self.data_dir.join("shaders");
        if !roots.contains(&installed) {
            roots.push(installed);
        }
        roots
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
