use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Loads configuration from a file into a struct.
/// Supports TOML, YAML, JSON, etc. based on file extension.
pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_str = path.as_ref().to_str().context("Invalid config path")?;

    let settings = Config::builder()
        .add_source(File::with_name(path_str))
        .build()
        .context("Failed to build configuration")?;

    settings.try_deserialize::<T>().context("Failed to deserialize configuration")
}

/// Like [`load_config`], with `PREFIX_*` environment variables layered on top
/// of the file (`DMT_COOLDOWN_SECS` overrides `cooldown_secs`).
pub fn load_config_with_env<T: DeserializeOwned, P: AsRef<Path>>(path: P, prefix: &str) -> Result<T> {
    let path_str = path.as_ref().to_str().context("Invalid config path")?;

    let settings = Config::builder()
        .add_source(File::with_name(path_str))
        .add_source(Environment::with_prefix(prefix))
        .build()
        .context("Failed to build configuration")?;

    settings.try_deserialize::<T>().context("Failed to deserialize configuration")
}
