use serde::{Deserialize, Serialize};

use crate::codec::CodecError;
use crate::state::IndexState;
use crate::storage::StorageError;

pub mod layout;
pub mod manager;
mod stable;

pub use manager::LogManager;

/// Position of an entry in the log. Assigned by the caller.
pub type LogId = u64;

/// One immutable state transition of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogId,
    pub state: IndexState,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl LogEntry {
    pub fn new(id: LogId, state: IndexState, content: serde_json::Value) -> Self {
        Self { id, state, content }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log entry {id} already exists")]
    Conflict { id: LogId },

    #[error("log entry {id} does not exist")]
    MissingEntry { id: LogId },

    #[error("log entry {id} is {state}, which is not a stable state")]
    NotStable { id: LogId, state: IndexState },

    #[error("stable pointer holds non-stable state {state}")]
    UnstablePointer { state: IndexState },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}
