//! Ban type for user accounts

use super::{BanType, BanTypeBase, Subject, remove_items, store_items, tidy_mode};
use crate::ban::{BanError, BanResult, BanStore, CheckResult, Clock, LogEntry, LogMode};
use std::sync::Arc;
use tracing::warn;

/// ID of the guest account, which can never be banned
pub const ANONYMOUS_USER_ID: u64 = 1;

const MODE: &str = "user";

/// Bans user accounts by numeric ID
pub struct UserBanType {
    base: BanTypeBase,
    store: BanStore,
}

impl UserBanType {
    pub fn new(store: BanStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            base: BanTypeBase::new(clock),
            store,
        }
    }

    /// Parse the configured items into user IDs, dropping the guest account
    fn user_ids(&self) -> BanResult<Vec<String>> {
        let mut ids = Vec::with_capacity(self.base.items().len());

        for item in self.base.items() {
            let id: u64 = item
                .trim()
                .parse()
                .map_err(|_| BanError::InvalidItem(format!("not a user id: {item}")))?;

            if id == ANONYMOUS_USER_ID {
                warn!(user_id = id, "Refusing to ban the anonymous user");
                continue;
            }

            let id = id.to_string();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        Ok(ids)
    }

    /// One user log entry per affected account
    fn log_for_users(&mut self, operation: &str, ids: &[String]) {
        for id in ids {
            let entry = LogEntry::new(operation, vec![id.clone(), self.base.message().to_string()]);
            self.base.add_log_entry(LogMode::User, entry);
        }
    }
}

impl BanType for UserBanType {
    fn base(&self) -> &BanTypeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BanTypeBase {
        &mut self.base
    }

    fn ban(&mut self) -> BanResult<bool> {
        let ids = self.user_ids()?;
        if !store_items(&mut self.base, &self.store, MODE, &ids, false, "LOG_BAN_USER") {
            return Ok(false);
        }
        self.log_for_users("LOG_BAN_USER", &ids);
        Ok(true)
    }

    fn exclude(&mut self) -> BanResult<Option<bool>> {
        let ids = self.user_ids()?;
        let stored = store_items(
            &mut self.base,
            &self.store,
            MODE,
            &ids,
            true,
            "LOG_BAN_EXCLUDE_USER",
        );
        Ok(Some(stored))
    }

    fn check(&self, subject: &Subject) -> CheckResult {
        let user_id = subject.user_id.to_string();
        self.store
            .check(MODE, self.base.now(), |record| record.item == user_id)
    }

    fn remove(&mut self) -> BanResult<bool> {
        let ids = self.user_ids()?;
        if !remove_items(&mut self.base, &self.store, MODE, &ids, "LOG_UNBAN_USER") {
            return Ok(false);
        }
        self.log_for_users("LOG_UNBAN_USER", &ids);
        Ok(true)
    }

    fn tidy(&mut self) -> bool {
        tidy_mode(&self.base, &self.store, MODE)
    }

    fn is_exclude_possible(&self) -> bool {
        true
    }
}
