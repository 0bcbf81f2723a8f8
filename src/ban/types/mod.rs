//! Ban types
//!
//! A ban type is one strategy for restricting access: by user, by IP address
//! or by email pattern. Every strategy implements [`BanType`] and keeps its
//! configuration in a [`BanTypeBase`], which provides the shared defaults.

mod email;
mod ip;
mod user;

pub use email::EmailBanType;
pub use ip::IpBanType;
pub use user::{ANONYMOUS_USER_ID, UserBanType};

use crate::ban::{
    BanError, BanRecord, BanResult, BanStore, CheckResult, Clock, LogData, LogEntry, LogMode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// The subject a check is run against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub user_id: u64,
    pub username: String,
    pub email: String,
    pub ip: String,
}

/// Configuration and log buffer shared by all ban types
pub struct BanTypeBase {
    ban_end: Option<DateTime<Utc>>,
    displayed_message: String,
    message: String,
    items: Vec<String>,
    log_data: LogData,
    clock: Arc<dyn Clock>,
}

impl BanTypeBase {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            ban_end: None,
            displayed_message: String::new(),
            message: String::new(),
            items: Vec::new(),
            log_data: LogData::new(),
            clock,
        }
    }

    /// Store the ban end after checking that it lies in the future
    ///
    /// # Errors
    /// Returns `InvalidBanEnd` if `ban_end` is not after the current moment
    pub fn set_ban_end(&mut self, ban_end: Option<DateTime<Utc>>) -> BanResult<()> {
        if let Some(end) = ban_end {
            if end <= self.clock.now() {
                return Err(BanError::invalid_ban_end(end.to_rfc3339()));
            }
        }

        self.ban_end = ban_end;
        Ok(())
    }

    #[must_use]
    pub fn ban_end(&self) -> Option<DateTime<Utc>> {
        self.ban_end
    }

    pub fn set_displayed_message(&mut self, displayed_message: String) {
        self.displayed_message = displayed_message;
    }

    #[must_use]
    pub fn displayed_message(&self) -> &str {
        &self.displayed_message
    }

    pub fn set_message(&mut self, message: String) {
        self.message = message;
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_items(&mut self, items: Vec<String>) {
        self.items = items;
    }

    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Buffer a log entry until the manager collects it
    pub fn add_log_entry(&mut self, mode: LogMode, entry: LogEntry) {
        self.log_data.entry(mode).or_default().push(entry);
    }

    /// Take every buffered log entry, leaving the buffer empty
    pub fn take_log_data(&mut self) -> LogData {
        std::mem::take(&mut self.log_data)
    }
}

/// Capabilities every ban strategy provides
pub trait BanType {
    fn base(&self) -> &BanTypeBase;

    fn base_mut(&mut self) -> &mut BanTypeBase;

    /// Apply a ban to the configured items
    ///
    /// # Errors
    /// Returns an error if an item is not valid for this ban type
    fn ban(&mut self) -> BanResult<bool>;

    /// Exempt the configured items. `None` means exclusion is not supported.
    ///
    /// # Errors
    /// Returns an error if an item is not valid for this ban type
    fn exclude(&mut self) -> BanResult<Option<bool>> {
        Ok(None)
    }

    fn check(&self, subject: &Subject) -> CheckResult;

    /// Revoke bans and exclusions of the configured items
    ///
    /// # Errors
    /// Returns an error if an item is not valid for this ban type
    fn remove(&mut self) -> BanResult<bool>;

    /// Purge expired state. Returns whether anything was purged.
    fn tidy(&mut self) -> bool {
        false
    }

    /// Drain the log entries of the last operation, grouped by mode
    fn get_log_data(&mut self) -> LogData {
        self.base_mut().take_log_data()
    }

    /// # Errors
    /// Returns `InvalidBanEnd` if `ban_end` is not in the future
    fn set_ban_end(&mut self, ban_end: Option<DateTime<Utc>>) -> BanResult<()> {
        self.base_mut().set_ban_end(ban_end)
    }

    fn set_displayed_message(&mut self, displayed_message: String) {
        self.base_mut().set_displayed_message(displayed_message);
    }

    fn set_message(&mut self, message: String) {
        self.base_mut().set_message(message);
    }

    fn set_items(&mut self, items: Vec<String>) {
        self.base_mut().set_items(items);
    }

    fn is_exclude_possible(&self) -> bool {
        false
    }
}

/// Build the admin log entry for an operation on `items`
fn admin_entry(operation: &str, base: &BanTypeBase, items: &[String]) -> LogEntry {
    LogEntry::new(operation, vec![base.message().to_string(), items.join(", ")])
}

/// Store one record per item using the current configuration of `base` and
/// buffer the admin log entry. Returns false when there was nothing to store.
fn store_items(
    base: &mut BanTypeBase,
    store: &BanStore,
    mode: &str,
    items: &[String],
    exclude: bool,
    operation: &str,
) -> bool {
    if items.is_empty() {
        return false;
    }

    let now = base.now();
    for item in items {
        let mut record = BanRecord::new(mode, item.clone(), now);
        record.exclude = exclude;
        record.end = base.ban_end();
        record.reason = base.message().to_string();
        record.displayed_reason = base.displayed_message().to_string();
        store.add(record);
    }

    let entry = admin_entry(operation, base, items);
    base.add_log_entry(LogMode::Admin, entry);

    info!(
        mode = %mode,
        items = items.len(),
        exclude = exclude,
        ban_end = ?base.ban_end(),
        "Ban records stored"
    );

    true
}

/// Delete the records of `items` and buffer the admin log entry if any existed
fn remove_items(
    base: &mut BanTypeBase,
    store: &BanStore,
    mode: &str,
    items: &[String],
    operation: &str,
) -> bool {
    let removed = store.remove_items(mode, items);
    if removed == 0 {
        return false;
    }

    let entry = admin_entry(operation, base, items);
    base.add_log_entry(LogMode::Admin, entry);

    info!(mode = %mode, removed = removed, "Ban records removed");
    true
}

/// Purge expired records of `mode`
fn tidy_mode(base: &BanTypeBase, store: &BanStore, mode: &str) -> bool {
    let purged = store.tidy(mode, base.now());
    if purged > 0 {
        debug!(mode = %mode, purged = purged, "Expired ban records purged");
    }
    purged > 0
}
