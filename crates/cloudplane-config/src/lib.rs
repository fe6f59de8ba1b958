pub mod error;
pub mod model;

pub use error::*;
pub use model::*;

use std::path::{Path, PathBuf};

/// Environment variable naming a config file directly
pub const CONFIG_PATH_ENV: &str = "CLOUDPLANE_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["cloudplane.local.yaml", "cloudplane.yaml"];

/// cloudplane's per-user config directory, created on first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("cloudplane");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the config file.
///
/// Search order:
/// 1. `CLOUDPLANE_CONFIG_PATH`
/// 2. current directory: cloudplane.local.yaml, cloudplane.yaml
/// 3. `./.cloudplane/`, same names
/// 4. `~/.config/cloudplane/cloudplane.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let local_dir = current_dir.join(".cloudplane");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("cloudplane").join("cloudplane.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Parse and validate a config file
pub fn load_config(path: &Path) -> Result<ControlPlaneConfig> {
    let text = std::fs::read_to_string(path)?;
    let config: ControlPlaneConfig =
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Discover and load the config file
pub fn load() -> Result<ControlPlaneConfig> {
    let path = find_config_file()?;
    load_config(&path)
}

/// Like [`load`], but an absent file yields the defaults
pub fn load_or_default() -> Result<ControlPlaneConfig> {
    match find_config_file() {
        Ok(path) => load_config(&path),
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No config file found, using defaults");
            Ok(ControlPlaneConfig::default())
        }
        Err(e) => Err(e),
    }
}
