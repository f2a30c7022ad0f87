// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a DAG file without checking it.
///
/// Defaults from the `serde` attributes are already applied; graph checks
/// happen in [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let raw: RawConfigFile = toml::from_str(&text)?;
    debug!(path = %path.display(), dags = raw.dag.len(), "parsed config file");
    Ok(raw)
}

/// Read a DAG file and validate it into a [`ConfigFile`].
///
/// Rejects files without DAGs, DAGs without tasks, `parallelism = 0`,
/// malformed durations, `after` / `chain` entries naming unknown tasks, and
/// dependency cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}

/// `Dagflow.toml`, resolved against the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Dagflow.toml")
}
