//! Configuration management
//!
//! Handles config.toml (user-defined) and config.lock (generated with all defaults).

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::{Error, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let config: Config = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
    Ok(config)
}

/// Load a generated lock file
pub fn load_lock<P: AsRef<Path>>(path: P) -> Result<ConfigLock> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let lock: ConfigLock = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
    Ok(lock)
}

/// Generate a lock file from config, filling in all defaults
pub fn generate_lock(config: &Config) -> ConfigLock {
    ConfigLock::from_config(config)
}
