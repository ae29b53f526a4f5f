// In-Memory Backend
//
// Process-local store used by tests and dry runs. A single lock guards
// files and directories so existence checks and inserts are atomic.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{StorageBackend, StorageError};

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl Tree {
    fn add_parents(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    fn has_children(&self, dir: &Path) -> bool {
        self.files.keys().any(|p| p.parent() == Some(dir))
            || self.dirs.iter().any(|p| p.parent() == Some(dir))
    }
}

/// Operations that can be made to fail on demand.
#[derive(Debug, Default)]
struct Faults {
    writes: AtomicBool,
    renames: AtomicBool,
    deletes: AtomicBool,
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tree: Mutex<Tree>,
    faults: Faults,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `write_new` fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.faults.writes.store(fail, Ordering::SeqCst);
    }

    /// Make every `rename_no_clobber` fail with an I/O error.
    pub fn fail_renames(&self, fail: bool) {
        self.faults.renames.store(fail, Ordering::SeqCst);
    }

    /// Make every `delete` fail with an I/O error.
    pub fn fail_deletes(&self, fail: bool) {
        self.faults.deletes.store(fail, Ordering::SeqCst);
    }

    /// Overwrite a file in place, bypassing the no-clobber contract.
    ///
    /// Only useful to simulate external corruption.
    pub fn corrupt(&self, path: &Path, bytes: &[u8]) {
        let mut tree = self.tree.lock();
        tree.add_parents(path);
        tree.files.insert(path.to_path_buf(), bytes.to_vec());
    }

    /// All file paths currently stored.
    pub fn files(&self) -> Vec<PathBuf> {
        self.tree.lock().files.keys().cloned().collect()
    }

    fn injected(path: &Path, op: &str) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source: io::Error::other(format!("injected {op} failure")),
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let tree = self.tree.lock();
        Ok(tree.files.contains_key(path) || tree.dirs.contains(path))
    }

    fn read_all(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        self.tree
            .lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }

    fn write_new(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        if self.faults.writes.load(Ordering::SeqCst) {
            return Err(Self::injected(path, "write"));
        }

        let mut tree = self.tree.lock();
        if tree.files.contains_key(path) || tree.dirs.contains(path) {
            return Err(StorageError::AlreadyExists(path.to_path_buf()));
        }
        tree.add_parents(path);
        tree.files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn rename_no_clobber(&self, src: &Path, dst: &Path) -> Result<(), StorageError> {
        if self.faults.renames.load(Ordering::SeqCst) {
            return Err(Self::injected(dst, "rename"));
        }

        let mut tree = self.tree.lock();
        if !tree.files.contains_key(src) {
            return Err(StorageError::NotFound(src.to_path_buf()));
        }
        if tree.files.contains_key(dst) || tree.dirs.contains(dst) {
            return Err(StorageError::AlreadyExists(dst.to_path_buf()));
        }

        if let Some(bytes) = tree.files.remove(src) {
            tree.add_parents(dst);
            tree.files.insert(dst.to_path_buf(), bytes);
        }
        Ok(())
    }

    fn delete(&self, path: &Path, recursive: bool) -> Result<(), StorageError> {
        if self.faults.deletes.load(Ordering::SeqCst) {
            return Err(Self::injected(path, "delete"));
        }

        let mut tree = self.tree.lock();
        if tree.files.remove(path).is_some() {
            return Ok(());
        }
        if !tree.dirs.contains(path) {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        if !recursive && tree.has_children(path) {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source: io::Error::other("directory not empty"),
            });
        }

        tree.files.retain(|p, _| !p.starts_with(path));
        tree.dirs.retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn list_children(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let tree = self.tree.lock();
        if !tree.dirs.contains(dir) {
            return Err(StorageError::NotFound(dir.to_path_buf()));
        }

        let names = tree
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        Ok(names)
    }
}
