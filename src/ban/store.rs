//! Ban store
//!
//! This module provides a shared store for ban and exclusion records. Every
//! concrete ban type writes its records here under its own mode.

use crate::ban::{BanResult, CheckResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A stored ban or exclusion of a single item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Unique ID of this record
    pub id: String,
    /// Ban type that owns the record, e.g. `user`
    pub mode: String,
    /// Normalized item, meaning depends on the mode
    pub item: String,
    /// Whether this is an exclusion rather than a ban
    pub exclude: bool,
    /// When the record was created
    pub start: DateTime<Utc>,
    /// When the record expires, `None` for permanent
    pub end: Option<DateTime<Utc>>,
    /// Reason shown to other staff
    pub reason: String,
    /// Reason shown to the affected subject
    pub displayed_reason: String,
}

impl BanRecord {
    pub fn new(mode: impl Into<String>, item: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mode: mode.into(),
            item: item.into(),
            exclude: false,
            start,
            end: None,
            reason: String::new(),
            displayed_reason: String::new(),
        }
    }

    /// Whether the record has run out at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end.is_some_and(|end| end <= now)
    }
}

/// Identity of a record: at most one ban and one exclusion per mode and item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    mode: String,
    item: String,
    exclude: bool,
}

impl From<&BanRecord> for RecordKey {
    fn from(record: &BanRecord) -> Self {
        Self {
            mode: record.mode.clone(),
            item: record.item.clone(),
            exclude: record.exclude,
        }
    }
}

/// Store for ban records
#[derive(Clone, Default)]
pub struct BanStore {
    records: Arc<DashMap<RecordKey, BanRecord>>,
}

impl BanStore {
    /// Create an empty ban store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing any record for the same mode, item and kind
    pub fn add(&self, record: BanRecord) {
        self.records.insert(RecordKey::from(&record), record);
    }

    /// Get a record by ID
    pub fn get(&self, id: &str) -> Option<BanRecord> {
        self.records
            .iter()
            .find(|entry| entry.value().id == id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove the records of a mode whose item is in `items`.
    /// Returns the number of removed records.
    pub fn remove_items(&self, mode: &str, items: &[String]) -> usize {
        self.remove_where(|record| record.mode == mode && items.contains(&record.item))
    }

    /// Evaluate the live records of a mode against a subject.
    ///
    /// A matching exclusion beats a matching ban.
    pub fn check<F>(&self, mode: &str, now: DateTime<Utc>, matches: F) -> CheckResult
    where
        F: Fn(&BanRecord) -> bool,
    {
        let mut result = CheckResult::NoResult;

        for entry in self.records.iter() {
            let record = entry.value();
            if record.mode != mode || record.is_expired(now) || !matches(record) {
                continue;
            }
            if record.exclude {
                return CheckResult::Excluded;
            }
            result = CheckResult::Banned;
        }

        result
    }

    /// Purge expired records of a mode. Returns the number of purged records.
    pub fn tidy(&self, mode: &str, now: DateTime<Utc>) -> usize {
        self.remove_where(|record| record.mode == mode && record.is_expired(now))
    }

    // Counted inside `retain` since other handles may insert meanwhile
    fn remove_where(&self, doomed: impl Fn(&BanRecord) -> bool) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let purge = doomed(record);
            removed += usize::from(purge);
            !purge
        });
        removed
    }

    /// Load records from a YAML file.
    ///
    /// A missing file yields an empty store.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub async fn load(path: impl AsRef<Path>) -> BanResult<Self> {
        let store = Self::new();

        let file_content = match tokio::fs::read_to_string(path.as_ref()).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(e.into()),
        };

        let records = serde_yaml::from_str::<Vec<BanRecord>>(&file_content)?;
        for record in records {
            store.add(record);
        }

        info!("Loaded {} ban records", store.len());
        Ok(store)
    }

    /// Save all records to a YAML file, creating the parent directory if needed
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created, the records cannot
    /// be serialized or the file cannot be written
    pub async fn save(&self, path: impl AsRef<Path>) -> BanResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut records: Vec<BanRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        let yaml = serde_yaml::to_string(&records)?;
        tokio::fs::write(path, yaml).await?;

        Ok(())
    }
}
