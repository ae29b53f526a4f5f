// Log Manager
//
// Reads, writes and promotes entries in one log namespace.
//
// Writes are optimistic: the encoded entry is staged under a random
// name and then renamed onto its id without clobbering. The first
// rename wins; every other writer of the same id gets a conflict.
// No locks are taken, in process or across processes.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::layout::LogLayout;
use super::{LogEntry, LogError, LogId};
use crate::codec::{EntryCodec, JsonCodec};
use crate::config::LogConfig;
use crate::state::IndexState;
use crate::storage::{StorageBackend, StorageError};

/// Bound on remove-then-rename rounds when promoters race.
const MAX_POINTER_SWAPS: u32 = 8;

pub struct LogManager<B, C = JsonCodec> {
    pub(super) backend: B,
    pub(super) codec: C,
    pub(super) layout: LogLayout,
    pub(super) config: LogConfig,
}

impl<B: StorageBackend> LogManager<B, JsonCodec> {
    /// Manager over `namespace` with the JSON codec and default config.
    pub fn new(backend: B, namespace: impl Into<PathBuf>) -> Self {
        Self::with_codec(backend, JsonCodec, namespace, LogConfig::default_config())
    }
}

impl<B: StorageBackend, C: EntryCodec> LogManager<B, C> {
    pub fn with_codec(
        backend: B,
        codec: C,
        namespace: impl Into<PathBuf>,
        config: LogConfig,
    ) -> Self {
        Self {
            backend,
            codec,
            layout: LogLayout::new(namespace),
            config,
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn layout(&self) -> &LogLayout {
        &self.layout
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn is_stable(&self, state: IndexState) -> bool {
        self.config.stable_states.contains(state)
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Entry stored at `id`, or `None` if nothing was written there.
    pub fn get(&self, id: LogId) -> Result<Option<LogEntry>, LogError> {
        self.read_entry(&self.layout.entry_path(id))
    }

    /// Highest id with an entry in the namespace.
    ///
    /// Children whose names are not plain integers (staging files, the
    /// stable pointer) are ignored.
    pub fn latest_id(&self) -> Result<Option<LogId>, LogError> {
        Ok(self.list_ids()?.into_iter().max())
    }

    pub fn latest_entry(&self) -> Result<Option<LogEntry>, LogError> {
        match self.latest_id()? {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    /// Every entry in ascending id order.
    pub fn history(&self) -> Result<Vec<LogEntry>, LogError> {
        let mut ids = self.list_ids()?;
        ids.sort_unstable();

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.get(id)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn list_ids(&self) -> Result<Vec<LogId>, LogError> {
        let namespace = self.layout.namespace();
        match self.backend.list_children(namespace) {
            Ok(names) => Ok(names
                .iter()
                .filter_map(|name| LogLayout::parse_id(name))
                .collect()),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => {
                warn!(op = "list", namespace = %namespace.display(), error = %e, "Failed to list log namespace");
                Err(e.into())
            }
        }
    }

    pub(super) fn read_entry(&self, path: &Path) -> Result<Option<LogEntry>, LogError> {
        let bytes = match self.backend.read_all(path) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => {
                warn!(op = "read", path = %path.display(), error = %e, "Failed to read log entry");
                return Err(e.into());
            }
        };

        match self.codec.decode(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(op = "decode", path = %path.display(), error = %e, "Corrupt log entry");
                Err(e.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Write `entry` at `id` unless something is already there.
    ///
    /// Returns `false` on conflict or any storage failure; the cause is
    /// logged. See [`LogManager::try_write`] for the tagged outcome.
    pub fn write(&self, id: LogId, entry: &LogEntry) -> bool {
        match self.try_write(id, entry) {
            Ok(()) => true,
            Err(LogError::Conflict { .. }) => {
                info!(op = "write", id, "Log entry already exists, write rejected");
                false
            }
            Err(e) => {
                warn!(op = "write", id, namespace = %self.layout.namespace().display(), error = %e, "Failed to write log entry");
                false
            }
        }
    }

    /// Write `entry` at `id`, failing with [`LogError::Conflict`] if the
    /// id is taken or another writer publishes it first.
    ///
    /// Nothing is ever visible at the entry path unless the whole write
    /// succeeded.
    pub fn try_write(&self, id: LogId, entry: &LogEntry) -> Result<(), LogError> {
        let path = self.layout.entry_path(id);
        if self.backend.exists(&path)? {
            return Err(LogError::Conflict { id });
        }

        let bytes = self.codec.encode(entry)?;
        let staging = self.stage(&bytes)?;

        match self.publish(&staging, &path) {
            Ok(()) => {
                debug!(id, path = %path.display(), "Log entry written");
                Ok(())
            }
            Err(e) if e.is_already_exists() => Err(LogError::Conflict { id }),
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Stable pointer maintenance
    // ------------------------------------------------------------------

    /// Copy the entry at `id` into the stable pointer slot.
    ///
    /// Returns `false` on any failure; the cause is logged.
    pub fn promote_stable(&self, id: LogId) -> bool {
        match self.try_promote_stable(id) {
            Ok(()) => true,
            Err(e) => {
                warn!(op = "promote", id, namespace = %self.layout.namespace().display(), error = %e, "Failed to promote stable pointer");
                false
            }
        }
    }

    /// Copy the bytes at `id` verbatim into the stable pointer slot,
    /// replacing the previous pointer.
    ///
    /// The pointer is briefly absent between removing the old copy and
    /// publishing the new one; readers then fall back to the scan.
    /// With `validate_on_promote` set, a non-stable entry is rejected
    /// before anything is written.
    pub fn try_promote_stable(&self, id: LogId) -> Result<(), LogError> {
        let source = self.layout.entry_path(id);
        let bytes = match self.backend.read_all(&source) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Err(LogError::MissingEntry { id }),
            Err(e) => return Err(e.into()),
        };

        if self.config.validate_on_promote {
            let entry = self.codec.decode(&bytes)?;
            if !self.is_stable(entry.state) {
                return Err(LogError::NotStable {
                    id,
                    state: entry.state,
                });
            }
        }

        let pointer = self.layout.stable_pointer_path();
        let staging = self.stage(&bytes)?;
        self.replace_pointer(&staging, &pointer)?;

        info!(id, path = %pointer.display(), "Stable pointer promoted");
        Ok(())
    }

    /// Swap `staging` in as the stable pointer.
    ///
    /// A rename conflict means a concurrent promoter published between
    /// our remove and rename; remove theirs and try again so the last
    /// promoter wins. If we keep losing, the pointer we lost to is at
    /// least as recent as ours and the promotion counts as superseded.
    fn replace_pointer(&self, staging: &Path, pointer: &Path) -> Result<(), StorageError> {
        for attempt in 1..=MAX_POINTER_SWAPS {
            if let Err(e) = self.remove_if_present(pointer) {
                self.discard_staging(staging);
                return Err(e);
            }
            match self.backend.rename_no_clobber(staging, pointer) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_already_exists() => {
                    debug!(attempt, path = %pointer.display(), "Concurrent promotion, retrying pointer swap");
                }
                Err(e) => {
                    self.discard_staging(staging);
                    return Err(e);
                }
            }
        }

        debug!(path = %pointer.display(), "Promotion superseded by a concurrent promoter");
        self.discard_staging(staging);
        Ok(())
    }

    /// Remove the stable pointer. An absent pointer counts as success.
    pub fn delete_stable(&self) -> bool {
        match self.try_delete_stable() {
            Ok(()) => true,
            Err(e) => {
                warn!(op = "delete_stable", namespace = %self.layout.namespace().display(), error = %e, "Failed to delete stable pointer");
                false
            }
        }
    }

    pub fn try_delete_stable(&self) -> Result<(), LogError> {
        let pointer = self.layout.stable_pointer_path();
        if self.remove_if_present(&pointer)? {
            info!(path = %pointer.display(), "Stable pointer deleted");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Staging helpers
    // ------------------------------------------------------------------

    fn stage(&self, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let staging = self.layout.staging_path();
        match self.backend.write_new(&staging, bytes) {
            Ok(()) => Ok(staging),
            Err(e) => {
                self.discard_staging(&staging);
                Err(e)
            }
        }
    }

    fn publish(&self, staging: &Path, dst: &Path) -> Result<(), StorageError> {
        self.backend
            .rename_no_clobber(staging, dst)
            .inspect_err(|_| self.discard_staging(staging))
    }

    fn discard_staging(&self, staging: &Path) {
        if let Err(e) = self.backend.delete(staging, false) {
            if !e.is_not_found() {
                warn!(path = %staging.display(), error = %e, "Failed to remove staging file");
            }
        }
    }

    fn remove_if_present(&self, path: &Path) -> Result<bool, StorageError> {
        match self.backend.delete(path, false) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
