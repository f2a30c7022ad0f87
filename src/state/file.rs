// src/state/file.rs

//! File-backed run state: one TOML document per run.
//!
//! Layout:
//!
//! ```text
//! <state_dir>/<dag_id>/<YYYYMMDDTHHMMSSZ>_<nanos>.toml
//! ```
//!
//! Every write rewrites the whole document through a temporary file and a
//! rename, so a crash never leaves a half-written run behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::dag::Graph;
use crate::errors::{DagflowError, Result};
use crate::fs::FileSystem;
use crate::state::{RunInstance, RunKey, StateStore, TaskInstance};

#[derive(Debug, Clone)]
pub struct FileStateStore {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(fs: Arc<dyn FileSystem>, root: PathBuf) -> Self {
        Self { fs, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document holding `key`.
    pub fn run_path(&self, key: &RunKey) -> PathBuf {
        let file = format!(
            "{}_{:09}.toml",
            key.logical_date.format("%Y%m%dT%H%M%SZ"),
            key.logical_date.timestamp_subsec_nanos()
        );
        self.root.join(&key.dag_id).join(file)
    }

    fn read(&self, path: &Path) -> Result<RunInstance> {
        let contents = self.fs.read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn write(&self, run: &RunInstance) -> Result<()> {
        let path = self.run_path(&run.key);
        let tmp = path.with_extension("toml.tmp");
        let contents = toml::to_string_pretty(run)?;

        self.fs.write(&tmp, contents.as_bytes())?;
        self.fs.rename(&tmp, &path)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn create(&mut self, graph: &Graph, logical_date: DateTime<Utc>) -> Result<RunInstance> {
        let run = RunInstance::new(graph, logical_date);
        let path = self.run_path(&run.key);

        if self.fs.exists(&path) {
            return Err(DagflowError::RunAlreadyExists {
                graph: run.key.dag_id.clone(),
                logical_date: run.key.date_string(),
            });
        }

        self.write(&run)?;
        debug!(run = %run.key, path = ?path, "created run state file");
        Ok(run)
    }

    fn load(&self, key: &RunKey) -> Result<RunInstance> {
        let path = self.run_path(key);
        if !self.fs.exists(&path) {
            return Err(key.not_found());
        }
        self.read(&path)
    }

    fn set(&mut self, key: &RunKey, task: &str, instance: TaskInstance) -> Result<()> {
        let mut run = self.load(key)?;
        run.apply(task, instance)?;
        self.write(&run)
    }

    fn mark_cancelled(&mut self, key: &RunKey) -> Result<()> {
        let mut run = self.load(key)?;
        run.cancelled = true;
        self.write(&run)
    }

    fn runs(&self) -> Result<Vec<RunKey>> {
        let mut keys = Vec::new();
        if !self.fs.is_dir(&self.root) {
            return Ok(keys);
        }

        for dag_dir in self.fs.read_dir(&self.root)? {
            if !self.fs.is_dir(&dag_dir) {
                continue;
            }
            for path in self.fs.read_dir(&dag_dir)? {
                if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                    continue;
                }
                match self.read(&path) {
                    Ok(run) => keys.push(run.key),
                    Err(err) => warn!(path = ?path, error = %err, "skipping unreadable run state file"),
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
