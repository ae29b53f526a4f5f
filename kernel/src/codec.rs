// Entry Codec
//
// Byte encoding of log entries. The log manager only ever stores the
// codec's output, so any encoding works as long as decode inverts it.

use crate::log::LogEntry;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode log entry {id}: {source}")]
    Encode {
        id: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode log entry: {0}")]
    Decode(#[source] serde_json::Error),
}

pub trait EntryCodec: Send + Sync {
    fn encode(&self, entry: &LogEntry) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<LogEntry, CodecError>;
}

/// Pretty-printed JSON, one document per entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EntryCodec for JsonCodec {
    fn encode(&self, entry: &LogEntry) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec_pretty(entry).map_err(|source| CodecError::Encode {
            id: entry.id,
            source,
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<LogEntry, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::IndexState;
    use serde_json::json;

    #[test]
    fn parse_entry_json() {
        let json = r#"
        {
          "id": 4,
          "state": "REFRESHING",
          "content": { "indexedColumns": ["a", "b"], "numBuckets": 200 }
        }
        "#;

        let entry = JsonCodec.decode(json.as_bytes()).unwrap();

        assert_eq!(entry.id, 4);
        assert_eq!(entry.state, IndexState::Refreshing);
        assert_eq!(entry.content["numBuckets"], json!(200));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = JsonCodec.decode(b"{ not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn unknown_state_is_rejected() {
        let json = br#"{ "id": 0, "state": "HALF_BUILT", "content": null }"#;
        assert!(JsonCodec.decode(json).is_err());
    }
}
