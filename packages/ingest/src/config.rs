//! Dashboard configuration loading.
//!
//! A configuration is picked from an explicit path, then the
//! `LITTER_MAP_CONFIG` environment variable, then the Goiânia defaults
//! embedded at compile time.

use std::path::{Path, PathBuf};

use litter_map_ingest_models::DashboardConfig;

use crate::IngestError;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "LITTER_MAP_CONFIG";

const DEFAULT_CONFIG_TOML: &str = include_str!("../config/goiania.toml");

/// Returns the embedded default configuration.
///
/// # Panics
///
/// Panics if the embedded TOML fails to parse.
#[must_use]
pub fn default_config() -> DashboardConfig {
    toml::de::from_str(DEFAULT_CONFIG_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse embedded default config: {e}"))
}

/// Parses a configuration from TOML text.
///
/// # Errors
///
/// Returns [`IngestError::Config`] if the TOML is invalid.
pub fn parse_config(toml_str: &str) -> Result<DashboardConfig, IngestError> {
    Ok(toml::de::from_str(toml_str)?)
}

/// Loads a configuration file. Relative input paths resolve against the
/// file's directory.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<DashboardConfig, IngestError> {
    let content = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&content)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    log::info!("Loaded dashboard config '{}' from {}", config.name, path.display());
    Ok(config.with_base_dir(base_dir))
}

/// Resolves the configuration to use: `explicit`, then
/// [`CONFIG_ENV`], then [`default_config`].
///
/// # Errors
///
/// Returns [`IngestError`] if a named file cannot be read or parsed.
pub fn resolve_config(explicit: Option<&Path>) -> Result<DashboardConfig, IngestError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
        return load_config(&path);
    }

    log::info!("No config given, using embedded defaults");
    Ok(default_config())
}
