//! Persistent hash store backing incremental shader compilation.
//!
//! One JSON file maps each source path to the 32-byte content hash it was
//! last compiled with and the SPIR-V artifact it produced.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub source_hash: [u8; 32],
    pub spirv_path: PathBuf,
}

#[derive(Debug)]
pub struct HashStore {
    path: PathBuf,
    entries: HashMap<PathBuf, StoreEntry>,
}

impl HashStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                trace!("discarding unreadable hash store: {err}");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self { path, entries })
    }

    pub fn lookup(&self, source_path: &Path) -> Option<&StoreEntry> {
        self.entries.get(source_path)
    }

    /// Whether `source_path` still matches the hash it was last compiled with.
    pub fn is_up_to_date(&self, source_path: &Path, source_hash: &[u8; 32]) -> bool {
        self.lookup(source_path)
            .is_some_and(|entry| entry.source_hash == *source_hash)
    }

    pub fn upsert(&mut self, source_path: PathBuf, source_hash: [u8; 32], spirv_path: PathBuf) {
        self.entries.insert(
            source_path,
            StoreEntry {
                source_hash,
                spirv_path,
            },
        );
    }

    pub fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.entries).expect("store entries serialize");
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_lookup_returns_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HashStore::open(dir.path().join("store.json")).unwrap();

        let hash = [7_u8; 32];
        store.upsert("a.vert".into(), hash, "a.vert.spv".into());

        let entry = store.lookup(Path::new("a.vert")).unwrap();
        assert_eq!(entry.source_hash, hash);
        assert_eq!(entry.spirv_path, PathBuf::from("a.vert.spv"));
    }

    #[test]
    fn up_to_date_only_on_matching_hash() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HashStore::open(dir.path().join("store.json")).unwrap();
        store.upsert("a.vert".into(), [7_u8; 32], "a.vert.spv".into());

        assert!(store.is_up_to_date(Path::new("a.vert"), &[7_u8; 32]));
        assert!(!store.is_up_to_date(Path::new("a.vert"), &[8_u8; 32]));
        assert!(!store.is_up_to_date(Path::new("b.vert"), &[7_u8; 32]));
    }

    #[test]
    fn save_and_reopen_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut store = HashStore::open(&path).unwrap();
        store.upsert("a.comp".into(), [1_u8; 32], "a.comp.spv".into());
        store.save().unwrap();

        let reopened = HashStore::open(&path).unwrap();
        assert!(reopened.is_up_to_date(Path::new("a.comp"), &[1_u8; 32]));
    }

    #[test]
    fn corrupt_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let store = HashStore::open(&path).unwrap();
        assert!(store.lookup(Path::new("a.vert")).is_none());
    }
}
