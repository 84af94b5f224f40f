//! Run history: most-recent-first, one entry per (script, directory).

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::PersistedList;

pub const HISTORY_FILE: &str = "history.json";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub script: String,
    pub directory: String,
    pub project_name: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    fn same_key(&self, script: &str, directory: &str) -> bool {
        self.script == script && self.directory == directory
    }
}

/// Inserts `record` at the front, dropping any earlier entry with the same key
/// and trimming the list to `limit`.
pub fn push_record(history: &mut Vec<HistoryRecord>, record: HistoryRecord, limit: usize) {
    history.retain(|h| !h.same_key(&record.script, &record.directory));
    history.insert(0, record);
    history.truncate(limit);
}

#[derive(Debug, Clone)]
pub struct History {
    store: PersistedList<HistoryRecord>,
    limit: usize,
}

impl History {
    pub fn new(config_dir: &Path, limit: usize) -> Self {
        Self {
            store: PersistedList::new(config_dir.join(HISTORY_FILE)),
            limit: limit.max(1),
        }
    }

    pub fn record(&self, script: &str, directory: &Path, project_name: &str) {
        self.record_at(script, directory, project_name, Utc::now());
    }

    pub fn record_at(
        &self,
        script: &str,
        directory: &Path,
        project_name: &str,
        timestamp: DateTime<Utc>,
    ) {
        let mut history = self.store.load();
        push_record(
            &mut history,
            HistoryRecord {
                script: script.to_string(),
                directory: directory.display().to_string(),
                project_name: project_name.to_string(),
                timestamp,
            },
            self.limit,
        );
        self.store.save(&history);
    }

    /// Most recent runs in `directory`, newest first.
    pub fn recent(&self, directory: &Path, limit: usize) -> Vec<HistoryRecord> {
        let directory = directory.display().to_string();
        self.store
            .load()
            .into_iter()
            .filter(|h| h.directory == directory)
            .take(limit)
            .collect()
    }

    pub fn global_recent(&self, limit: usize) -> Vec<HistoryRecord> {
        self.store.load().into_iter().take(limit).collect()
    }

    pub fn all(&self) -> Vec<HistoryRecord> {
        self.store.load()
    }

    pub fn clear(&self) {
        self.store.save(&[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn same_key_twice_keeps_one_entry_with_later_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path(), DEFAULT_HISTORY_LIMIT);
        let project = Path::new("/work/app");
        let first = Utc::now();
        let later = first + Duration::seconds(5);
        history.record_at("build", project, "app", first);
        history.record_at("test", project, "app", first);
        history.record_at("build", project, "app", later);

        let all = history.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].script, "build");
        assert_eq!(all[0].timestamp, later);
        assert_eq!(all.iter().filter(|h| h.script == "build").count(), 1);
    }

    #[test]
    fn twenty_one_distinct_entries_evict_the_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path(), DEFAULT_HISTORY_LIMIT);
        for idx in 0..21 {
            history.record(&format!("script-{idx}"), Path::new("/work"), "work");
        }
        let all = history.all();
        assert_eq!(all.len(), 20);
        assert_eq!(all[0].script, "script-20");
        assert!(all.iter().all(|h| h.script != "script-0"));
    }

    #[test]
    fn same_script_in_other_directory_is_a_distinct_key() {
        let mut list = Vec::new();
        let now = Utc::now();
        for dir in ["/a", "/b"] {
            push_record(
                &mut list,
                HistoryRecord {
                    script: "dev".into(),
                    directory: dir.into(),
                    project_name: "p".into(),
                    timestamp: now,
                },
                DEFAULT_HISTORY_LIMIT,
            );
        }
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].directory, "/b");
    }

    #[test]
    fn recent_filters_by_directory_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path(), DEFAULT_HISTORY_LIMIT);
        history.record("a", Path::new("/one"), "one");
        history.record("b", Path::new("/two"), "two");
        history.record("c", Path::new("/one"), "one");
        history.record("d", Path::new("/one"), "one");

        let recent: Vec<_> = history
            .recent(Path::new("/one"), 2)
            .into_iter()
            .map(|h| h.script)
            .collect();
        assert_eq!(recent, vec!["d", "c"]);
        assert_eq!(history.global_recent(10).len(), 4);

        history.clear();
        assert!(history.all().is_empty());
    }

    #[test]
    fn serializes_camel_case_fields() {
        let record = HistoryRecord {
            script: "dev".into(),
            directory: "/x".into(),
            project_name: "x".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"projectName\""));
    }
}
