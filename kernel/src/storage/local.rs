// Local Filesystem Backend
//
// Paths are resolved relative to a root directory. The no-clobber
// rename is a hard link followed by unlinking the source: `link(2)`
// fails atomically when the destination exists.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{StorageBackend, StorageError};

#[derive(Debug, Clone)]
pub struct LocalFsBackend {
    root: PathBuf,
    #[cfg(test)]
    fail_dir_sync: bool,
}

impl LocalFsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            #[cfg(test)]
            fail_dir_sync: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn sync_parent(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            #[cfg(test)]
            if self.fail_dir_sync {
                return Err(StorageError::Io {
                    path: parent.to_path_buf(),
                    source: std::io::Error::other("injected directory sync failure"),
                });
            }

            let dir = File::open(parent).map_err(|e| StorageError::from_io(parent, e))?;
            dir.sync_all().map_err(|e| StorageError::from_io(parent, e))?;
        }
        Ok(())
    }
}

impl StorageBackend for LocalFsBackend {
    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let full = self.resolve(path);
        full.try_exists().map_err(|e| StorageError::from_io(&full, e))
    }

    fn read_all(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path);
        fs::read(&full).map_err(|e| StorageError::from_io(&full, e))
    }

    fn write_new(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::from_io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .map_err(|e| StorageError::from_io(&full, e))?;

        file.write_all(bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| StorageError::from_io(&full, e))?;

        debug!(path = %full.display(), size_bytes = bytes.len(), "File written");
        Ok(())
    }

    fn rename_no_clobber(&self, src: &Path, dst: &Path) -> Result<(), StorageError> {
        let from = self.resolve(src);
        let to = self.resolve(dst);

        fs::hard_link(&from, &to).map_err(|e| match e.kind() {
            // link(2) reports a missing source as NotFound too; tell them apart
            std::io::ErrorKind::NotFound if !from.exists() => StorageError::NotFound(from.clone()),
            _ => StorageError::from_io(&to, e),
        })?;

        if let Err(e) = fs::remove_file(&from) {
            // Destination is already published; the source is only residue.
            warn!(path = %from.display(), error = %e, "Failed to unlink rename source");
        }

        // The link already published `to`; reporting failure now would
        // make a completed rename look undone.
        if let Err(e) = self.sync_parent(&to) {
            warn!(path = %to.display(), error = %e, "Failed to sync directory after rename");
        }
        debug!(src = %from.display(), dst = %to.display(), "Rename completed");
        Ok(())
    }

    fn delete(&self, path: &Path, recursive: bool) -> Result<(), StorageError> {
        let full = self.resolve(path);
        let result = if full.is_dir() {
            if recursive {
                fs::remove_dir_all(&full)
            } else {
                fs::remove_dir(&full)
            }
        } else {
            fs::remove_file(&full)
        };
        result.map_err(|e| StorageError::from_io(&full, e))
    }

    fn list_children(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let full = self.resolve(dir);
        let entries = fs::read_dir(&full).map_err(|e| StorageError::from_io(&full, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::from_io(&full, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| StorageError::from_io(&entry.path(), e))?;
            if file_type.is_dir() {
                continue;
            }
            // Non UTF-8 names can never be ids.
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend() -> (TempDir, LocalFsBackend) {
        let dir = TempDir::new().unwrap();
        let backend = LocalFsBackend::new(dir.path());
        (dir, backend)
    }

    #[test]
    fn write_new_refuses_overwrite() {
        let (_dir, fs) = backend();
        let path = Path::new("ns/0");

        fs.write_new(path, b"first").unwrap();
        let err = fs.write_new(path, b"second").unwrap_err();

        assert!(err.is_already_exists());
        assert_eq!(fs.read_all(path).unwrap(), b"first");
    }

    #[test]
    fn rename_does_not_clobber() {
        let (_dir, fs) = backend();
        fs.write_new(Path::new("ns/a.tmp"), b"loser").unwrap();
        fs.write_new(Path::new("ns/1"), b"winner").unwrap();

        let err = fs
            .rename_no_clobber(Path::new("ns/a.tmp"), Path::new("ns/1"))
            .unwrap_err();

        assert!(err.is_already_exists());
        assert_eq!(fs.read_all(Path::new("ns/1")).unwrap(), b"winner");
        assert!(fs.exists(Path::new("ns/a.tmp")).unwrap());
    }

    #[test]
    fn rename_moves_source() {
        let (_dir, fs) = backend();
        fs.write_new(Path::new("ns/b.tmp"), b"payload").unwrap();

        fs.rename_no_clobber(Path::new("ns/b.tmp"), Path::new("ns/2"))
            .unwrap();

        assert!(!fs.exists(Path::new("ns/b.tmp")).unwrap());
        assert_eq!(fs.read_all(Path::new("ns/2")).unwrap(), b"payload");
    }

    #[test]
    fn missing_paths_are_not_found() {
        let (_dir, fs) = backend();

        assert!(fs.read_all(Path::new("ns/9")).unwrap_err().is_not_found());
        assert!(fs.list_children(Path::new("ns")).unwrap_err().is_not_found());
        assert!(fs.delete(Path::new("ns/9"), false).unwrap_err().is_not_found());
        assert!(fs
            .rename_no_clobber(Path::new("ns/x.tmp"), Path::new("ns/3"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn rename_survives_directory_sync_failure() {
        let (_dir, mut fs) = backend();
        fs.fail_dir_sync = true;
        fs.write_new(Path::new("ns/c.tmp"), b"payload").unwrap();

        fs.rename_no_clobber(Path::new("ns/c.tmp"), Path::new("ns/5"))
            .unwrap();

        assert!(!fs.exists(Path::new("ns/c.tmp")).unwrap());
        assert_eq!(fs.read_all(Path::new("ns/5")).unwrap(), b"payload");
    }

    #[test]
    fn published_write_reports_success_despite_sync_failure() {
        use crate::log::{LogEntry, LogManager};
        use crate::state::IndexState;

        let (_dir, mut fs) = backend();
        fs.fail_dir_sync = true;
        let log = LogManager::new(fs, "ns");
        let entry = LogEntry::new(0, IndexState::Active, serde_json::json!({}));

        assert!(log.write(0, &entry));
        assert_eq!(log.get(0).unwrap(), Some(entry.clone()));
        assert!(!log.write(0, &entry));
    }

    #[test]
    fn subdirectories_are_not_listed() {
        let (dir, fs) = backend();
        fs.write_new(Path::new("ns/0"), b"a").unwrap();
        std::fs::create_dir_all(dir.path().join("ns/5")).unwrap();

        assert_eq!(fs.list_children(Path::new("ns")).unwrap(), vec!["0"]);
    }

    #[test]
    fn list_and_recursive_delete() {
        let (_dir, fs) = backend();
        fs.write_new(Path::new("ns/0"), b"a").unwrap();
        fs.write_new(Path::new("ns/1"), b"b").unwrap();

        let mut names = fs.list_children(Path::new("ns")).unwrap();
        names.sort();
        assert_eq!(names, vec!["0", "1"]);

        fs.delete(Path::new("ns"), true).unwrap();
        assert!(!fs.exists(Path::new("ns")).unwrap());
    }
}
