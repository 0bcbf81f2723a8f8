//! Ban type for email addresses and patterns

use super::{BanType, BanTypeBase, Subject, remove_items, store_items, tidy_mode};
use crate::ban::{BanError, BanResult, BanStore, CheckResult, Clock};
use glob::{MatchOptions, Pattern};
use std::sync::Arc;

const MODE: &str = "email";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Bans email addresses. Items may use `*` wildcards, e.g. `*@example.com`.
pub struct EmailBanType {
    base: BanTypeBase,
    store: BanStore,
}

impl EmailBanType {
    pub fn new(store: BanStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            base: BanTypeBase::new(clock),
            store,
        }
    }

    fn patterns(&self) -> BanResult<Vec<String>> {
        let mut patterns = Vec::with_capacity(self.base.items().len());

        for item in self.base.items() {
            let pattern = item.trim().to_lowercase();
            let has_parts = pattern
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
            if !has_parts || Pattern::new(&pattern).is_err() {
                return Err(BanError::InvalidItem(format!(
                    "not an email pattern: {item}"
                )));
            }
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }

        Ok(patterns)
    }
}

impl BanType for EmailBanType {
    fn base(&self) -> &BanTypeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BanTypeBase {
        &mut self.base
    }

    fn ban(&mut self) -> BanResult<bool> {
        let patterns = self.patterns()?;
        Ok(store_items(
            &mut self.base,
            &self.store,
            MODE,
            &patterns,
            false,
            "LOG_BAN_EMAIL",
        ))
    }

    fn check(&self, subject: &Subject) -> CheckResult {
        let email = subject.email.trim();
        if email.is_empty() {
            return CheckResult::NoResult;
        }

        self.store.check(MODE, self.base.now(), |record| {
            Pattern::new(&record.item)
                .is_ok_and(|pattern| pattern.matches_with(email, MATCH_OPTIONS))
        })
    }

    fn remove(&mut self) -> BanResult<bool> {
        let patterns = self.patterns()?;
        Ok(remove_items(
            &mut self.base,
            &self.store,
            MODE,
            &patterns,
            "LOG_UNBAN_EMAIL",
        ))
    }

    fn tidy(&mut self) -> bool {
        tidy_mode(&self.base, &self.store, MODE)
    }
}
