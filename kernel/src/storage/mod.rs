// Storage Backend Abstraction
//
// Defines the capability set the log manager needs from the
// underlying hierarchical store. Implementations may persist to a
// local disk, object storage, or memory.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod local;
pub mod memory;

pub use local::LocalFsBackend;
pub use memory::InMemoryBackend;

/// Failures reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Map an `io::Error` for `path`, keeping not-found and
    /// already-exists as distinct variants.
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.to_path_buf()),
            _ => StorageError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::AlreadyExists(_))
    }
}

/// Hierarchical byte store backing a log namespace.
///
/// Properties required from implementations:
/// - `write_new` never overwrites an existing file
/// - `rename_no_clobber` is atomic and fails if the destination exists
/// - a file is durable once it is visible
///
/// Implementations MUST NOT:
/// - Expose partially written files at a destination path
/// - Silently replace a destination on rename
pub trait StorageBackend: Send + Sync {
    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> Result<bool, StorageError>;

    /// Read the whole file at `path`.
    fn read_all(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Create a new file holding `bytes`, creating parent directories.
    ///
    /// Fails with `AlreadyExists` if `path` is taken.
    fn write_new(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;

    /// Move `src` to `dst`, failing with `AlreadyExists` if `dst` exists.
    fn rename_no_clobber(&self, src: &Path, dst: &Path) -> Result<(), StorageError>;

    /// Remove a file, or a directory when `recursive` is set.
    fn delete(&self, path: &Path, recursive: bool) -> Result<(), StorageError>;

    /// Names of the files directly inside `dir`, in no particular order.
    ///
    /// Subdirectories are not listed.
    fn list_children(&self, dir: &Path) -> Result<Vec<String>, StorageError>;
}

impl<T: StorageBackend + ?Sized> StorageBackend for Arc<T> {
    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        (**self).exists(path)
    }

    fn read_all(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        (**self).read_all(path)
    }

    fn write_new(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).write_new(path, bytes)
    }

    fn rename_no_clobber(&self, src: &Path, dst: &Path) -> Result<(), StorageError> {
        (**self).rename_no_clobber(src, dst)
    }

    fn delete(&self, path: &Path, recursive: bool) -> Result<(), StorageError> {
        (**self).delete(path, recursive)
    }

    fn list_children(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        (**self).list_children(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_variants() {
        let path = Path::new("ns/3");

        let err = StorageError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());

        let err = StorageError::from_io(path, io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(err.is_already_exists());

        let err = StorageError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(err.to_string().contains("ns/3"));
    }
}
