// Indexlog Kernel
//
// Append-only, versioned metadata log for index state transitions,
// with a cached pointer to the latest stable entry.

pub mod codec;
pub mod config;
pub mod log;
pub mod state;
pub mod storage;

pub use codec::{CodecError, EntryCodec, JsonCodec};
pub use config::{ConfigError, LogConfig};
pub use log::{LogEntry, LogError, LogId, LogManager};
pub use state::{IndexState, StableStates};
pub use storage::{InMemoryBackend, LocalFsBackend, StorageBackend, StorageError};
