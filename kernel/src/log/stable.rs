// Stable Entry Resolution
//
// The stable pointer is a cache. When it is missing, the log itself is
// the ground truth: walk down from the highest id and take the first
// entry in a stable state.

use tracing::{debug, warn};

use super::{LogEntry, LogError, LogManager};
use crate::codec::EntryCodec;
use crate::storage::StorageBackend;

impl<B: StorageBackend, C: EntryCodec> LogManager<B, C> {
    /// Contents of the stable pointer slot, without falling back to a scan.
    ///
    /// Fails with [`LogError::UnstablePointer`] if the slot holds an entry
    /// whose state is not stable.
    pub fn stable_pointer(&self) -> Result<Option<LogEntry>, LogError> {
        let path = self.layout.stable_pointer_path();
        let Some(entry) = self.read_entry(&path)? else {
            return Ok(None);
        };

        if !self.is_stable(entry.state) {
            warn!(path = %path.display(), state = %entry.state, "Stable pointer holds a non-stable entry");
            return Err(LogError::UnstablePointer { state: entry.state });
        }
        Ok(Some(entry))
    }

    /// Most recent entry in a stable state.
    ///
    /// The pointer wins when present, even if a later stable entry
    /// exists. Otherwise ids are scanned from the highest down to zero;
    /// ids that were never written are skipped.
    ///
    /// The scan is not a snapshot: entries written while it runs may or
    /// may not be seen.
    pub fn latest_stable_entry(&self) -> Result<Option<LogEntry>, LogError> {
        if let Some(entry) = self.stable_pointer()? {
            debug!(id = entry.id, "Resolved stable entry from pointer");
            return Ok(Some(entry));
        }

        let Some(max_id) = self.latest_id()? else {
            return Ok(None);
        };

        for id in (0..=max_id).rev() {
            match self.get(id)? {
                Some(entry) if self.is_stable(entry.state) => {
                    debug!(id, max_id, "Resolved stable entry by scan");
                    return Ok(Some(entry));
                }
                _ => continue,
            }
        }

        debug!(max_id, "No stable entry in log");
        Ok(None)
    }
}
