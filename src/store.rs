//! Small JSON-backed lists under the per-user config directory.
//!
//! Both history and favorites are convenience data: a missing or corrupt file
//! reads as an empty list and a failed write is dropped.

use std::marker::PhantomData;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// An ordered list of `T` persisted as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct PersistedList<T> {
    path: PathBuf,
    _entry: PhantomData<fn() -> T>,
}

impl<T> PersistedList<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _entry: PhantomData,
        }
    }

    pub fn load(&self) -> Vec<T> {
        if !self.path.exists() {
            return Vec::new();
        }
        match self.try_load() {
            Ok(items) => items,
            Err(err) => {
                debug!(
                    path = %self.path.display(),
                    error = %err,
                    "treating unreadable list as empty"
                );
                Vec::new()
            }
        }
    }

    pub fn save(&self, items: &[T]) {
        if let Err(err) = self.try_save(items) {
            debug!(path = %self.path.display(), error = %err, "dropping list write");
        }
    }

    fn try_load(&self) -> Result<Vec<T>> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let items = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(items)
    }

    fn try_save(&self, items: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let list: PersistedList<String> = PersistedList::new(dir.path().join("nested/list.json"));
        assert!(list.load().is_empty());
        list.save(&["a".to_string(), "b".to_string()]);
        assert_eq!(list.load(), vec!["a", "b"]);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let list: PersistedList<u32> = PersistedList::new(&path);
        assert!(list.load().is_empty());
    }

    #[test]
    fn failed_write_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let list: PersistedList<u32> = PersistedList::new(blocker.join("list.json"));
        list.save(&[1]);
        assert!(list.load().is_empty());
    }
}
