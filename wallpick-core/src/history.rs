use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::crop::CropRectangle;
use crate::destination::Destination;
use crate::error::Result;

/// What was last applied to a destination. Kept for inspection only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub committed_at: DateTime<Utc>,
    pub destination: Destination,
    pub zoom: f64,
    pub crop: CropRectangle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl CommitRecord {
    pub fn now(destination: Destination, crop: CropRectangle, zoom: f64, source: Option<PathBuf>) -> Self {
        Self {
            committed_at: Utc::now(),
            destination,
            zoom,
            crop,
            source,
        }
    }
}

/// Commit records stored one JSON object per line, oldest first.
pub struct CommitHistory {
    path: PathBuf,
    limit: usize,
    records: Mutex<Vec<CommitRecord>>,
}

impl CommitHistory {
    /// Loads `path`, treating a missing file as an empty history.
    pub fn open(path: impl Into<PathBuf>, limit: usize) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            load_records(&path)?
        } else {
            Vec::new()
        };

        let history = Self {
            path,
            limit: limit.max(1),
            records: Mutex::new(records),
        };
        history.trim();
        Ok(history)
    }

    /// Appends `record`, drops the oldest ones past the limit, and rewrites the file.
    pub fn append(&self, record: CommitRecord) -> Result<()> {
        let mut records = self.records.lock();
        records.push(record);
        let excess = records.len().saturating_sub(self.limit);
        records.drain(..excess);

        let mut content = String::new();
        for record in records.iter() {
            content.push_str(&serde_json::to_string(record)?);
            content.push('\n');
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn last(&self) -> Option<CommitRecord> {
        self.records.lock().last().cloned()
    }

    /// Latest record for `destination`.
    pub fn last_for(&self, destination: Destination) -> Option<CommitRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .find(|r| r.destination == destination)
            .cloned()
    }

    /// Up to `max_results` records, newest first.
    pub fn recent(&self, max_results: usize) -> Vec<CommitRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .take(max_results)
            .cloned()
            .collect()
    }

    /// All records, oldest first.
    pub fn records(&self) -> Vec<CommitRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn trim(&self) {
        let mut records = self.records.lock();
        let excess = records.len().saturating_sub(self.limit);
        records.drain(..excess);
    }
}

fn load_records(path: &Path) -> Result<Vec<CommitRecord>> {
    let content = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CommitRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("skipping malformed history line {} in {}: {}", number + 1, path.display(), e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(destination: Destination, left: i32) -> CommitRecord {
        CommitRecord::now(destination, CropRectangle::new(left, 0, left + 100, 200), 1.5, None)
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let history = CommitHistory::open(dir.path().join("history.jsonl"), 10).unwrap();
        assert!(history.is_empty());
        assert_eq!(history.last(), None);
    }

    #[test]
    fn appended_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.jsonl");

        let history = CommitHistory::open(&path, 10).unwrap();
        history.append(record(Destination::Home, 0)).unwrap();
        history.append(record(Destination::Lock, 5)).unwrap();

        let reopened = CommitHistory::open(&path, 10).unwrap();
        assert_eq!(reopened.records(), history.records());
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.last().unwrap().destination, Destination::Lock);
        assert_eq!(reopened.last_for(Destination::Home).unwrap().crop.left, 0);
    }

    #[test]
    fn limit_keeps_newest_records() {
        let dir = tempfile::tempdir().unwrap();
        let history = CommitHistory::open(dir.path().join("history.jsonl"), 3).unwrap();
        for left in 0..5 {
            history.append(record(Destination::Home, left)).unwrap();
        }

        let lefts: Vec<i32> = history.recent(10).iter().map(|r| r.crop.left).collect();
        assert_eq!(lefts, vec![4, 3, 2]);
        assert_eq!(history.recent(1).len(), 1);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let good = serde_json::to_string(&record(Destination::Lock, 7)).unwrap();
        fs::write(&path, format!("not json\n{}\n\n", good)).unwrap();

        let history = CommitHistory::open(&path, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.last().unwrap().crop.left, 7);
    }
}
