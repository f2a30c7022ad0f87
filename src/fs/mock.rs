// src/fs/mock.rs

//! In-memory [`FileSystem`] for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow, bail};

use super::FileSystem;

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl Tree {
    /// Record `dir` and all of its ancestors.
    fn add_dirs(&mut self, dir: &Path) {
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() || !self.dirs.insert(ancestor.to_path_buf()) {
                break;
            }
        }
    }

    fn put(&mut self, path: &Path, contents: Vec<u8>) {
        if let Some(dir) = path.parent() {
            self.add_dirs(dir);
        }
        self.files.insert(path.to_path_buf(), contents);
    }
}

/// Files and directories kept in memory. Clones share one tree, so a test
/// can inspect what a store wrote through its own handle.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    tree: Arc<Mutex<Tree>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or replace a file, adding missing parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        self.tree().put(path.as_ref(), contents.into());
    }

    /// Contents of a file as UTF-8, if it exists.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let bytes = self.tree().files.get(path.as_ref())?.clone();
        String::from_utf8(bytes).ok()
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let tree = self.tree();
        match tree.files.get(path) {
            Some(bytes) => String::from_utf8(bytes.clone())
                .map_err(|e| anyhow!("{} is not valid UTF-8: {e}", path.display())),
            None if tree.dirs.contains(path) => bail!("{} is a directory", path.display()),
            None => bail!("{} does not exist", path.display()),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut tree = self.tree();
        if tree.dirs.contains(path) {
            bail!("{} is a directory", path.display());
        }
        tree.put(path, contents.to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut tree = self.tree();
        let contents = tree
            .files
            .remove(from)
            .ok_or_else(|| anyhow!("{} does not exist", from.display()))?;
        tree.put(to, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let tree = self.tree();
        tree.files.contains_key(path) || tree.dirs.contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.tree().dirs.contains(path)
    }

    fn read_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let tree = self.tree();
        if !tree.dirs.contains(dir) {
            bail!("{} is not a directory", dir.display());
        }

        let mut entries: Vec<PathBuf> = tree
            .files
            .keys()
            .chain(tree.dirs.iter())
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect();
        entries.sort();
        Ok(entries)
    }
}
