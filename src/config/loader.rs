// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{AssetdagError, Result};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Assetdag.toml";

/// Read and deserialize a configuration file, without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        AssetdagError::invalid_config(format!("reading config file {}: {e}", path.display()))
    })?;
    Ok(toml::from_str(&contents)?)
}

/// Deserialize and validate configuration text.
pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    let raw: RawConfigFile = toml::from_str(contents)?;
    Ok(ConfigFile::try_from(raw)?)
}

/// Read, deserialize and validate a configuration file.
///
/// Everything that can be checked without touching the sources is checked
/// here: task references, cycles, path sets, durations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw = load_from_path(&path)?;
    Ok(ConfigFile::try_from(raw)?)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
