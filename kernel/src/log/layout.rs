// Namespace Layout
//
// Maps log ids to file names inside a namespace directory:
//
//   <namespace>/0, <namespace>/1, ...   one file per entry
//   <namespace>/latestStable            stable pointer slot
//   <namespace>/.<uuid>.tmp             in-flight staging files

use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::LogId;

/// File name of the stable pointer slot.
pub const STABLE_POINTER_NAME: &str = "latestStable";

const STAGING_PREFIX: &str = ".";
const STAGING_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    namespace: PathBuf,
}

impl LogLayout {
    pub fn new(namespace: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &Path {
        &self.namespace
    }

    pub fn entry_path(&self, id: LogId) -> PathBuf {
        self.namespace.join(id.to_string())
    }

    pub fn stable_pointer_path(&self) -> PathBuf {
        self.namespace.join(STABLE_POINTER_NAME)
    }

    /// A fresh staging path; unique across writers and processes.
    pub fn staging_path(&self) -> PathBuf {
        self.namespace.join(format!(
            "{STAGING_PREFIX}{}{STAGING_SUFFIX}",
            Uuid::new_v4()
        ))
    }

    /// Parse a child name as a log id.
    ///
    /// Only canonical decimal spellings count: no sign, no whitespace,
    /// no leading zeros. Anything else is not an entry.
    pub fn parse_id(name: &str) -> Option<LogId> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if name.len() > 1 && name.starts_with('0') {
            return None;
        }
        name.parse().ok()
    }

    pub fn is_staging_name(name: &str) -> bool {
        name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_paths_are_decimal() {
        let layout = LogLayout::new("indexes/orders/_log");

        assert_eq!(layout.entry_path(0), Path::new("indexes/orders/_log/0"));
        assert_eq!(layout.entry_path(42), Path::new("indexes/orders/_log/42"));
        assert_eq!(
            layout.stable_pointer_path(),
            Path::new("indexes/orders/_log/latestStable")
        );
    }

    #[test]
    fn only_canonical_integers_parse() {
        assert_eq!(LogLayout::parse_id("0"), Some(0));
        assert_eq!(LogLayout::parse_id("17"), Some(17));
        assert_eq!(LogLayout::parse_id(&u64::MAX.to_string()), Some(u64::MAX));

        for name in [
            "",
            "-1",
            "+3",
            " 4",
            "007",
            "1.5",
            "latestStable",
            "18446744073709551616",
        ] {
            assert_eq!(LogLayout::parse_id(name), None, "{name:?} parsed as id");
        }
    }

    #[test]
    fn staging_names_never_parse_as_ids() {
        let layout = LogLayout::new("ns");
        let a = layout.staging_path();
        let b = layout.staging_path();
        assert_ne!(a, b);

        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(LogLayout::is_staging_name(name));
        assert_eq!(LogLayout::parse_id(name), None);
    }
}
