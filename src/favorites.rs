//! Favorite scripts, keyed by (script, directory).

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::PersistedList;

pub const FAVORITES_FILE: &str = "favorites.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub script: String,
    pub directory: String,
    pub project_name: String,
    pub added_at: DateTime<Utc>,
}

impl FavoriteRecord {
    fn same_key(&self, script: &str, directory: &str) -> bool {
        self.script == script && self.directory == directory
    }
}

#[derive(Debug, Clone)]
pub struct Favorites {
    store: PersistedList<FavoriteRecord>,
}

impl Favorites {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            store: PersistedList::new(config_dir.join(FAVORITES_FILE)),
        }
    }

    /// Returns `false` when the pair is already a favorite.
    pub fn add(&self, script: &str, directory: &Path, project_name: &str) -> bool {
        let directory = directory.display().to_string();
        let mut favorites = self.store.load();
        if favorites.iter().any(|f| f.same_key(script, &directory)) {
            return false;
        }
        favorites.push(FavoriteRecord {
            script: script.to_string(),
            directory,
            project_name: project_name.to_string(),
            added_at: Utc::now(),
        });
        self.store.save(&favorites);
        true
    }

    /// Returns `false` when the pair was not a favorite.
    pub fn remove(&self, script: &str, directory: &Path) -> bool {
        let directory = directory.display().to_string();
        let mut favorites = self.store.load();
        let before = favorites.len();
        favorites.retain(|f| !f.same_key(script, &directory));
        if favorites.len() == before {
            return false;
        }
        self.store.save(&favorites);
        true
    }

    /// Flips the favorite state and returns the new one.
    pub fn toggle(&self, script: &str, directory: &Path, project_name: &str) -> bool {
        if self.is_favorite(script, directory) {
            self.remove(script, directory);
            false
        } else {
            self.add(script, directory, project_name);
            true
        }
    }

    pub fn is_favorite(&self, script: &str, directory: &Path) -> bool {
        let directory = directory.display().to_string();
        self.store
            .load()
            .iter()
            .any(|f| f.same_key(script, &directory))
    }

    pub fn for_directory(&self, directory: &Path) -> Vec<FavoriteRecord> {
        let directory = directory.display().to_string();
        self.store
            .load()
            .into_iter()
            .filter(|f| f.directory == directory)
            .collect()
    }

    pub fn all(&self) -> Vec<FavoriteRecord> {
        self.store.load()
    }
}
