use std::fs;
use std::path::PathBuf;

use chrono::{serde::ts_seconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{DorisError, ResolvedCommand, Result};

/// One resolved query and what became of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(with = "ts_seconds")]
    pub timestamp: DateTime<Utc>,
    /// The raw query as typed.
    pub query: String,
    pub action: String,
    pub args: Vec<Option<String>>,
    /// "ran(N)", "declined" or "failed: ...".
    pub outcome: String,
    /// Resolution plus execution time.
    pub duration_ms: u64,
}

/// Append-only log of resolved commands, bounded and persisted as JSON.
pub struct HistoryManager {
    file_path: PathBuf,
    max_entries: usize,
    entries: Vec<HistoryEntry>,
}

impl HistoryManager {
    pub fn new(file_path: PathBuf, max_entries: usize) -> HistoryManager {
        HistoryManager {
            file_path,
            max_entries,
            entries: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        query: &str,
        command: &ResolvedCommand,
        outcome: &str,
        duration_ms: u64,
    ) {
        self.entries.push(HistoryEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            query: query.to_string(),
            action: command.action.clone(),
            args: command.args.clone(),
            outcome: outcome.to_string(),
            duration_ms,
        });
        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if !self.file_path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&self.file_path)?;
        self.entries = serde_json::from_str(&content)
            .map_err(|e| DorisError::persistence(format!("invalid history format: {}", e)))?;
        if self.entries.len() > self.max_entries {
            let start = self.entries.len() - self.max_entries;
            self.entries.drain(..start);
        }
        Ok(())
    }

    /// Atomic write: temp file, then rename over the old log.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .map_err(|e| DorisError::persistence(format!("writing history: {}", e)))?;
        fs::rename(&temp_path, &self.file_path)
            .map_err(|e| DorisError::persistence(format!("finalizing history: {}", e)))?;
        Ok(())
    }

    /// The most recent `n` entries, oldest of them first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let n = n.min(self.entries.len());
        &self.entries[self.entries.len() - n..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(action: &str) -> ResolvedCommand {
        ResolvedCommand {
            action: action.to_string(),
            args: vec![Some("value".to_string()), None],
        }
    }

    #[test]
    fn records_and_bounds_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = HistoryManager::new(dir.path().join("history.json"), 3);
        for i in 0..5 {
            history.record(&format!("query {}", i), &command("start"), "ran(0)", 5);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.recent(3)[0].query, "query 2");
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = HistoryManager::new(path.clone(), 10);
        history.record("launch spotify", &command("start"), "ran(0)", 12);
        history.save().unwrap();

        let mut reloaded = HistoryManager::new(path, 10);
        reloaded.load().unwrap();
        assert_eq!(reloaded.len(), 1);
        let entry = &reloaded.recent(1)[0];
        assert_eq!(entry.query, "launch spotify");
        assert_eq!(entry.action, "start");
        assert_eq!(entry.args, vec![Some("value".to_string()), None]);
    }

    #[test]
    fn load_trims_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = HistoryManager::new(path.clone(), 10);
        for i in 0..6 {
            history.record(&format!("query {}", i), &command("start"), "ran(0)", 5);
        }
        history.save().unwrap();

        let mut trimmed = HistoryManager::new(path, 2);
        trimmed.load().unwrap();
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed.recent(2)[0].query, "query 4");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = HistoryManager::new(dir.path().join("history.json"), 10);
        history.load().unwrap();
        assert!(history.is_empty());
    }
}
