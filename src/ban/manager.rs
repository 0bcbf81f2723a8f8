//! Ban manager
//!
//! The manager selects one registered ban type, forwards configuration and
//! actions to it and turns the ban type's buffered log entries into calls on
//! the log sink. `check_all` and `tidy_all` work across every registered ban
//! type and need no selection.

use crate::MANAGER_TARGET;
use crate::ban::{
    ActorSource, BanError, BanListener, BanResult, BanStore, BanType, BanTypeRegistry,
    CheckResult, Clock, EventDispatcher, LogData, LogSink, SetItemsEvent, SetTypeEvent, Subject,
    SystemClock, TracingLogSink,
};
use crate::config::BanConfig;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Ban end accepted by [`BanManager::set_ban_end`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BanEnd {
    /// No end
    Permanent,
    /// Unix timestamp in seconds, `<= 0` means permanent
    Timestamp(i64),
    /// An exact moment
    At(DateTime<Utc>),
    /// RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or `@<unix timestamp>`
    Text(String),
}

impl From<i64> for BanEnd {
    fn from(timestamp: i64) -> Self {
        Self::Timestamp(timestamp)
    }
}

impl From<DateTime<Utc>> for BanEnd {
    fn from(at: DateTime<Utc>) -> Self {
        Self::At(at)
    }
}

impl From<Option<DateTime<Utc>>> for BanEnd {
    fn from(at: Option<DateTime<Utc>>) -> Self {
        at.map_or(Self::Permanent, Self::At)
    }
}

impl From<&str> for BanEnd {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for BanEnd {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl BanEnd {
    /// Convert into the moment handed to ban types, `None` for permanent
    ///
    /// # Errors
    /// Returns `InvalidBanEnd` if the value does not describe a moment
    pub fn resolve(self) -> BanResult<Option<DateTime<Utc>>> {
        match self {
            Self::Permanent => Ok(None),
            Self::Timestamp(timestamp) if timestamp <= 0 => Ok(None),
            Self::Timestamp(timestamp) => from_timestamp(timestamp).map(Some),
            Self::At(at) => Ok(Some(at)),
            Self::Text(text) => parse_ban_end(&text).map(Some),
        }
    }
}

fn from_timestamp(timestamp: i64) -> BanResult<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| BanError::invalid_ban_end(timestamp))
}

fn parse_ban_end(text: &str) -> BanResult<DateTime<Utc>> {
    let text = text.trim();

    if let Some(timestamp) = text.strip_prefix('@') {
        let timestamp: i64 = timestamp
            .parse()
            .map_err(|_| BanError::invalid_ban_end(text))?;
        return from_timestamp(timestamp);
    }

    match DateTime::parse_from_rfc3339(text) {
        Ok(at) => Ok(at.with_timezone(&Utc)),
        Err(source) => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
            .map(|naive| naive.and_utc())
            .map_err(|_| BanError::InvalidBanEnd {
                value: text.to_string(),
                source: Some(source),
            }),
    }
}

/// Orchestrates ban types
pub struct BanManager {
    current_type: Option<String>,
    dispatcher: EventDispatcher,
    log: Arc<dyn LogSink>,
    log_enabled: bool,
    types: BanTypeRegistry,
    actor: Arc<dyn ActorSource>,
    clock: Arc<dyn Clock>,
    // Store shared by the default types and the file it is saved to
    storage: Option<(BanStore, PathBuf)>,
}

impl BanManager {
    /// Create a manager over `types` with logging enabled and no type selected
    pub fn new(
        types: BanTypeRegistry,
        log: Arc<dyn LogSink>,
        actor: Arc<dyn ActorSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            current_type: None,
            dispatcher: EventDispatcher::new(),
            log,
            log_enabled: true,
            types,
            actor,
            clock,
            storage: None,
        }
    }

    /// Create a manager with the default ban types over `store`, logging
    /// through tracing. [`BanManager::save`] writes `store` to the configured
    /// data file.
    pub fn from_config(config: &BanConfig, store: &BanStore, actor: Arc<dyn ActorSource>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let types = BanTypeRegistry::with_default_types(store, &clock);

        let mut manager = Self::new(types, Arc::new(TracingLogSink), actor, clock);
        manager.log_enabled = config.log_enabled;
        manager.storage = Some((store.clone(), PathBuf::from(&config.data_file)));
        manager
    }

    /// Load the store from the configured data file and build a manager over it
    ///
    /// # Errors
    /// Returns an error if the data file exists but cannot be read or parsed
    pub async fn open(config: &BanConfig, actor: Arc<dyn ActorSource>) -> BanResult<Self> {
        let store = BanStore::load(&config.data_file).await?;
        info!(
            target: MANAGER_TARGET,
            data_file = %config.data_file,
            records = store.len(),
            "Ban store opened"
        );
        Ok(Self::from_config(config, &store, actor))
    }

    /// Write the store to the data file. Does nothing for managers that were
    /// not built from a configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub async fn save(&self) -> BanResult<()> {
        let Some((store, path)) = &self.storage else {
            return Ok(());
        };
        store.save(path).await?;
        debug!(target: MANAGER_TARGET, data_file = %path.display(), "Ban store saved");
        Ok(())
    }

    /// Register a listener for the set-type and set-items events
    pub fn add_listener(&mut self, listener: Box<dyn BanListener>) -> &mut Self {
        self.dispatcher.register(listener);
        self
    }

    /// Name of the selected ban type
    #[must_use]
    pub fn current_type(&self) -> Option<&str> {
        self.current_type.as_deref()
    }

    #[must_use]
    pub fn types(&self) -> &BanTypeRegistry {
        &self.types
    }

    #[must_use]
    pub fn is_log_enabled(&self) -> bool {
        self.log_enabled
    }

    fn current(&self) -> BanResult<&(dyn BanType + 'static)> {
        let name = self.current_type.as_deref().ok_or(BanError::NoBanType)?;
        self.types.get(name).ok_or(BanError::NoBanType)
    }

    fn current_mut(&mut self) -> BanResult<&mut (dyn BanType + 'static)> {
        let name = self.current_type.as_deref().ok_or(BanError::NoBanType)?;
        self.types.get_mut(name).ok_or(BanError::NoBanType)
    }

    /// Run an action on the selected ban type and forward its log entries
    fn run_logged<T>(
        &mut self,
        operation: &str,
        action: impl FnOnce(&mut dyn BanType) -> BanResult<T>,
    ) -> BanResult<T> {
        let current = self.current_mut()?;
        let result = action(&mut *current);
        // Drained even on failure so entries never leak into the next action
        let log_data = current.get_log_data();
        let result = result?;

        debug!(
            target: MANAGER_TARGET,
            ban_type = ?self.current_type,
            operation = %operation,
            "Ban action completed"
        );

        if self.log_enabled {
            self.forward_log(log_data);
        }

        Ok(result)
    }

    fn forward_log(&self, log_data: LogData) {
        if log_data.is_empty() {
            return;
        }

        let actor = self.actor.actor();
        for (mode, entries) in log_data {
            for entry in entries {
                self.log.add(
                    mode,
                    actor.user_id,
                    &actor.ip,
                    &entry.operation,
                    false,
                    &entry.data,
                );
            }
        }
    }

    /// Ban the configured items with the selected ban type
    ///
    /// # Errors
    /// Returns `NoBanType` if no ban type is selected, or the ban type's error
    pub fn ban(&mut self) -> BanResult<bool> {
        self.run_logged("ban", |ban_type| ban_type.ban())
    }

    /// Exempt the configured items. `None` if the ban type has no exclusions.
    ///
    /// # Errors
    /// Returns `NoBanType` if no ban type is selected, or the ban type's error
    pub fn exclude(&mut self) -> BanResult<Option<bool>> {
        self.run_logged("exclude", |ban_type| ban_type.exclude())
    }

    /// # Errors
    /// Returns `NoBanType` if no ban type is selected, or the ban type's error
    pub fn remove(&mut self) -> BanResult<bool> {
        self.run_logged("remove", |ban_type| ban_type.remove())
    }

    /// Check a subject against the selected ban type
    ///
    /// # Errors
    /// Returns `NoBanType` if no ban type is selected
    pub fn check(&self, subject: &Subject) -> BanResult<CheckResult> {
        Ok(self.current()?.check(subject))
    }

    /// Check a subject against every registered ban type
    #[must_use]
    pub fn check_all(&self, subject: &Subject) -> CheckResult {
        CheckResult::aggregate(
            self.types
                .iter()
                .map(|(_, ban_type)| ban_type.check(subject)),
        )
    }

    /// # Errors
    /// Returns `NoBanType` if no ban type is selected
    pub fn tidy(&mut self) -> BanResult<bool> {
        Ok(self.current_mut()?.tidy())
    }

    /// Tidy every registered ban type. True if any of them purged something.
    pub fn tidy_all(&mut self) -> bool {
        let mut purged = false;

        for (name, ban_type) in self.types.iter_mut() {
            if ban_type.tidy() {
                debug!(target: MANAGER_TARGET, ban_type = %name, "Ban type tidied");
                purged = true;
            }
        }

        purged
    }

    pub fn disable_log(&mut self) -> &mut Self {
        self.log_enabled = false;
        self
    }

    pub fn enable_log(&mut self) -> &mut Self {
        self.log_enabled = true;
        self
    }

    /// Set when the ban or exclusion ends
    ///
    /// # Errors
    /// Returns `NoBanType` if no ban type is selected and `InvalidBanEnd` if
    /// the value is not a moment in the future
    pub fn set_ban_end(&mut self, ban_end: impl Into<BanEnd>) -> BanResult<&mut Self> {
        let current = self.current_mut()?;
        current.set_ban_end(ban_end.into().resolve()?)?;
        Ok(self)
    }

    /// Set the ban end `seconds` from now, `<= 0` for a permanent ban
    ///
    /// # Errors
    /// Returns `NoBanType` if no ban type is selected and `InvalidBanEnd` if
    /// the end is out of range
    pub fn set_duration(&mut self, seconds: i64) -> BanResult<&mut Self> {
        let now = self.clock.now();
        let current = self.current_mut()?;

        let ban_end = if seconds > 0 {
            let end = Duration::try_seconds(seconds)
                .and_then(|duration| now.checked_add_signed(duration))
                .ok_or_else(|| BanError::invalid_ban_end(format!("{seconds} seconds from now")))?;
            Some(end)
        } else {
            None
        };

        current.set_ban_end(ban_end)?;
        Ok(self)
    }

    /// Set the message shown to the affected subject
    ///
    /// # Errors
    /// Returns `NoBanType` if no ban type is selected
    pub fn set_displayed_message(
        &mut self,
        displayed_message: impl Into<String>,
    ) -> BanResult<&mut Self> {
        self.current_mut()?
            .set_displayed_message(displayed_message.into());
        Ok(self)
    }

    /// Set the reason shown to other administrators and moderators
    ///
    /// # Errors
    /// Returns `NoBanType` if no ban type is selected
    pub fn set_message(&mut self, message: impl Into<String>) -> BanResult<&mut Self> {
        self.current_mut()?.set_message(message.into());
        Ok(self)
    }

    /// Set the items to act on. Listeners may rewrite the items or keep them
    /// from reaching the ban type.
    ///
    /// # Errors
    /// Returns `NoBanType` if no ban type is selected
    pub fn set_items<I, S>(&mut self, items: I) -> BanResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let current = self.current()?;
        let name = self.current_type.as_deref().unwrap_or_default();

        let items = items.into_iter().map(Into::into).collect();
        let mut event = SetItemsEvent::new(name, current, items);
        self.dispatcher.set_items(&mut event);
        let (items, overridden) = event.into_parts();

        if overridden {
            debug!(target: MANAGER_TARGET, ban_type = %name, "Setting items overridden by listener");
        } else {
            self.current_mut()?.set_items(items);
        }

        Ok(self)
    }

    /// Select the ban type by name, trying `name` and then `ban.type.<name>`
    ///
    /// # Errors
    /// Returns `InvalidBanType` if neither name is registered and no listener
    /// overrode the lookup
    pub fn set_type(&mut self, type_name: &str) -> BanResult<&mut Self> {
        let mut event = SetTypeEvent::new(self.current_type.as_deref(), type_name);
        self.dispatcher.set_type(&mut event);
        let (type_name, overridden) = event.into_parts();

        let resolved = if overridden {
            type_name
        } else {
            self.types
                .resolve(&type_name)
                .ok_or(BanError::InvalidBanType { type_name })?
        };

        info!(
            target: MANAGER_TARGET,
            ban_type = %resolved,
            overridden = overridden,
            "Ban type selected"
        );

        self.current_type = Some(resolved);
        Ok(self)
    }

    /// Whether the selected ban type supports exclusions
    ///
    /// # Errors
    /// Returns `NoBanType` if no ban type is selected
    pub fn is_exclude_possible(&self) -> BanResult<bool> {
        Ok(self.current()?.is_exclude_possible())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ban::{
        Actor, BanTypeBase, FixedClock, LogEntry, LogMode, MockActorSource, MockLogSink,
        UserBanType,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(now()))
    }

    fn actor() -> Arc<dyn ActorSource> {
        Arc::new(Actor::new(2, "10.0.0.9"))
    }

    fn quiet_log() -> Arc<dyn LogSink> {
        let mut log = MockLogSink::new();
        log.expect_add().never();
        Arc::new(log)
    }

    /// Ban type with canned answers that counts how often it is asked
    struct ScriptedType {
        base: BanTypeBase,
        check: CheckResult,
        tidy: bool,
        checks: Arc<AtomicUsize>,
        tidies: Arc<AtomicUsize>,
    }

    impl ScriptedType {
        fn new(check: CheckResult, tidy: bool) -> Self {
            Self {
                base: BanTypeBase::new(clock()),
                check,
                tidy,
                checks: Arc::new(AtomicUsize::new(0)),
                tidies: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl BanType for ScriptedType {
        fn base(&self) -> &BanTypeBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut BanTypeBase {
            &mut self.base
        }

        fn ban(&mut self) -> BanResult<bool> {
            let message = self.base.message().to_string();
            let items = self.base.items().to_vec();
            self.base
                .add_log_entry(LogMode::Admin, LogEntry::new("LOG_BAN_SCRIPTED", vec![message]));
            self.base
                .add_log_entry(LogMode::User, LogEntry::new("LOG_BAN_SCRIPTED_USER", items));
            Ok(true)
        }

        fn exclude(&mut self) -> BanResult<Option<bool>> {
            self.base
                .add_log_entry(LogMode::Admin, LogEntry::new("LOG_BAN_EXCLUDE_SCRIPTED", vec![]));
            Ok(Some(true))
        }

        fn check(&self, _subject: &Subject) -> CheckResult {
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.check
        }

        fn remove(&mut self) -> BanResult<bool> {
            self.base
                .add_log_entry(LogMode::Admin, LogEntry::new("LOG_UNBAN_SCRIPTED", vec![]));
            Ok(true)
        }

        fn tidy(&mut self) -> bool {
            self.tidies.fetch_add(1, Ordering::SeqCst);
            self.tidy
        }
    }

    fn manager(types: Vec<(&str, ScriptedType)>, log: Arc<dyn LogSink>) -> BanManager {
        let mut registry = BanTypeRegistry::new();
        for (name, ban_type) in types {
            registry.register(name, Box::new(ban_type));
        }
        BanManager::new(registry, log, actor(), clock())
    }

    fn single(log: Arc<dyn LogSink>) -> BanManager {
        manager(
            vec![("scripted", ScriptedType::new(CheckResult::NoResult, false))],
            log,
        )
    }

    fn items_of(manager: &BanManager) -> Vec<String> {
        let name = manager.current_type().unwrap();
        manager.types().get(name).unwrap().base().items().to_vec()
    }

    fn ban_end_of(manager: &BanManager) -> Option<DateTime<Utc>> {
        let name = manager.current_type().unwrap();
        manager.types().get(name).unwrap().base().ban_end()
    }

    struct ForceType(&'static str);

    impl BanListener for ForceType {
        fn on_set_type(&self, event: &mut SetTypeEvent<'_>) {
            event.type_name = self.0.to_string();
            event.overridden = true;
        }
    }

    struct RenameType(&'static str);

    impl BanListener for RenameType {
        fn on_set_type(&self, event: &mut SetTypeEvent<'_>) {
            event.type_name = self.0.to_string();
        }
    }

    struct TagItems;

    impl BanListener for TagItems {
        fn on_set_items(&self, event: &mut SetItemsEvent<'_>) {
            let tag = format!(
                "{}:{}",
                event.type_name(),
                event.current_type().is_exclude_possible()
            );
            event.items.push(tag);
        }
    }

    struct SuppressItems;

    impl BanListener for SuppressItems {
        fn on_set_items(&self, event: &mut SetItemsEvent<'_>) {
            event.overridden = true;
        }
    }

    #[test]
    fn test_operations_require_a_type() {
        let mut manager = single(quiet_log());
        let subject = Subject::default();

        assert!(matches!(manager.ban(), Err(BanError::NoBanType)));
        assert!(matches!(manager.exclude(), Err(BanError::NoBanType)));
        assert!(matches!(manager.remove(), Err(BanError::NoBanType)));
        assert!(matches!(manager.tidy(), Err(BanError::NoBanType)));
        assert!(matches!(manager.check(&subject), Err(BanError::NoBanType)));
        assert!(matches!(
            manager.is_exclude_possible(),
            Err(BanError::NoBanType)
        ));
        assert!(matches!(
            manager.set_ban_end(BanEnd::Permanent),
            Err(BanError::NoBanType)
        ));
        assert!(matches!(manager.set_duration(60), Err(BanError::NoBanType)));
        assert!(matches!(manager.set_message("spam"), Err(BanError::NoBanType)));
        assert!(matches!(
            manager.set_displayed_message("bye"),
            Err(BanError::NoBanType)
        ));
        assert!(matches!(
            manager.set_items(["a"]),
            Err(BanError::NoBanType)
        ));

        // These two walk the whole registry instead
        assert_eq!(manager.check_all(&subject), CheckResult::NoResult);
        assert!(!manager.tidy_all());
    }

    #[test]
    fn test_set_type_resolution() {
        let mut manager = manager(
            vec![
                ("ip", ScriptedType::new(CheckResult::NoResult, false)),
                (
                    "ban.type.email",
                    ScriptedType::new(CheckResult::NoResult, false),
                ),
            ],
            quiet_log(),
        );

        manager.set_type("ip").unwrap();
        assert_eq!(manager.current_type(), Some("ip"));

        manager.set_type("email").unwrap();
        assert_eq!(manager.current_type(), Some("ban.type.email"));

        let error = manager.set_type("nonexistent").err().unwrap();
        assert!(
            matches!(error, BanError::InvalidBanType { ref type_name } if type_name == "nonexistent")
        );
        assert_eq!(manager.current_type(), Some("ban.type.email"));
    }

    #[test]
    fn test_set_type_listeners() {
        let mut manager = single(quiet_log());
        manager.add_listener(Box::new(RenameType("scripted")));
        manager.set_type("anything").unwrap();
        assert_eq!(manager.current_type(), Some("scripted"));

        let mut manager = single(quiet_log());
        manager.add_listener(Box::new(ForceType("custom")));
        manager.set_type("nonexistent").unwrap();
        assert_eq!(manager.current_type(), Some("custom"));

        // Nothing is registered under the forced name
        assert!(matches!(manager.ban(), Err(BanError::NoBanType)));
    }

    #[test]
    fn test_set_items_listeners() {
        let mut manager = single(quiet_log());
        manager.add_listener(Box::new(TagItems));
        manager.set_type("scripted").unwrap().set_items(["a", "b"]).unwrap();
        assert_eq!(items_of(&manager), vec!["a", "b", "scripted:false"]);

        let mut manager = single(quiet_log());
        manager.add_listener(Box::new(SuppressItems));
        manager.set_type("scripted").unwrap().set_items(["a"]).unwrap();
        assert!(items_of(&manager).is_empty());
    }

    #[test]
    fn test_set_ban_end_normalization() {
        let mut manager = single(quiet_log());
        manager.set_type("scripted").unwrap();
        let hour_later = now() + Duration::hours(1);

        manager.set_ban_end(hour_later.timestamp()).unwrap();
        assert_eq!(ban_end_of(&manager), Some(hour_later));

        manager.set_ban_end(0_i64).unwrap();
        assert_eq!(ban_end_of(&manager), None);

        manager.set_ban_end(hour_later).unwrap();
        manager.set_ban_end(-5_i64).unwrap();
        assert_eq!(ban_end_of(&manager), None);

        manager.set_ban_end("2031-01-01T00:00:00Z").unwrap();
        let expected = Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(ban_end_of(&manager), Some(expected));

        manager.set_ban_end("2031-01-02 00:00:00").unwrap();
        assert_eq!(ban_end_of(&manager), Some(expected + Duration::days(1)));

        manager
            .set_ban_end(format!("@{}", hour_later.timestamp()))
            .unwrap();
        assert_eq!(ban_end_of(&manager), Some(hour_later));

        manager.set_ban_end(None::<DateTime<Utc>>).unwrap();
        assert_eq!(ban_end_of(&manager), None);
    }

    #[test]
    fn test_set_ban_end_rejects_past_and_garbage() {
        let mut manager = single(quiet_log());
        manager.set_type("scripted").unwrap();

        assert!(matches!(
            manager.set_ban_end(now()),
            Err(BanError::InvalidBanEnd { .. })
        ));
        assert!(matches!(
            manager.set_ban_end((now() - Duration::seconds(1)).timestamp()),
            Err(BanError::InvalidBanEnd { .. })
        ));
        assert!(matches!(
            manager.set_ban_end("@soon"),
            Err(BanError::InvalidBanEnd { source: None, .. })
        ));
        assert!(matches!(
            manager.set_ban_end("next tuesday"),
            Err(BanError::InvalidBanEnd {
                source: Some(_),
                ..
            })
        ));
        assert_eq!(ban_end_of(&manager), None);
    }

    #[test]
    fn test_set_duration() {
        let mut manager = single(quiet_log());
        manager.set_type("scripted").unwrap();

        manager.set_duration(3600).unwrap();
        assert_eq!(ban_end_of(&manager), Some(now() + Duration::seconds(3600)));

        manager.set_duration(0).unwrap();
        assert_eq!(ban_end_of(&manager), None);

        manager.set_duration(3600).unwrap().set_duration(-10).unwrap();
        assert_eq!(ban_end_of(&manager), None);

        assert!(matches!(
            manager.set_duration(i64::MAX),
            Err(BanError::InvalidBanEnd { .. })
        ));
    }

    #[test]
    fn test_check_all_ors_results() {
        let manager = manager(
            vec![
                ("a", ScriptedType::new(CheckResult::Banned, false)),
                ("b", ScriptedType::new(CheckResult::NoResult, false)),
                ("c", ScriptedType::new(CheckResult::Banned, false)),
            ],
            quiet_log(),
        );

        assert_eq!(manager.check_all(&Subject::default()), CheckResult::Banned);
    }

    #[test]
    fn test_check_all_short_circuits_on_exclusion() {
        let last = ScriptedType::new(CheckResult::Banned, false);
        let last_checks = Arc::clone(&last.checks);

        let manager = manager(
            vec![
                ("a", ScriptedType::new(CheckResult::Banned, false)),
                ("b", ScriptedType::new(CheckResult::Excluded, false)),
                ("c", last),
            ],
            quiet_log(),
        );

        assert_eq!(
            manager.check_all(&Subject::default()),
            CheckResult::Excluded
        );
        assert_eq!(last_checks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tidy_all_runs_every_type() {
        let types = vec![
            ScriptedType::new(CheckResult::NoResult, false),
            ScriptedType::new(CheckResult::NoResult, true),
            ScriptedType::new(CheckResult::NoResult, false),
        ];
        let counters: Vec<_> = types.iter().map(|t| Arc::clone(&t.tidies)).collect();

        let mut manager = manager(
            ["a", "b", "c"].into_iter().zip(types).collect(),
            quiet_log(),
        );

        assert!(manager.tidy_all());
        for counter in &counters {
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }

        let mut manager = single(quiet_log());
        assert!(!manager.tidy_all());
    }

    #[test]
    fn test_ban_forwards_log_entries() {
        let mut log = MockLogSink::new();
        log.expect_add()
            .withf(|mode, user_id, ip, operation, admin_only, data| {
                *mode == LogMode::Admin
                    && *user_id == 2
                    && ip == "10.0.0.9"
                    && operation == "LOG_BAN_SCRIPTED"
                    && !*admin_only
                    && data.len() == 1
                    && data[0] == "spam"
            })
            .times(1)
            .return_const(());
        log.expect_add()
            .withf(|mode, _, _, operation, admin_only, data| {
                *mode == LogMode::User
                    && operation == "LOG_BAN_SCRIPTED_USER"
                    && !*admin_only
                    && data.len() == 2
            })
            .times(1)
            .return_const(());

        let mut actor = MockActorSource::new();
        actor
            .expect_actor()
            .times(1)
            .returning(|| Actor::new(2, "10.0.0.9"));

        let mut registry = BanTypeRegistry::new();
        registry.register(
            "scripted",
            Box::new(ScriptedType::new(CheckResult::NoResult, false)),
        );
        let mut manager = BanManager::new(registry, Arc::new(log), Arc::new(actor), clock());

        let banned = manager
            .set_type("scripted")
            .unwrap()
            .set_message("spam")
            .unwrap()
            .set_items(["x", "y"])
            .unwrap()
            .ban()
            .unwrap();
        assert!(banned);
    }

    fn expect_operation(log: &mut MockLogSink, operation: &'static str, times: usize) {
        log.expect_add()
            .withf(move |_, _, _, logged, _, _| logged == operation)
            .times(times)
            .return_const(());
    }

    #[test]
    fn test_enabled_log_forwards_every_action() {
        let mut log = MockLogSink::new();
        expect_operation(&mut log, "LOG_BAN_SCRIPTED", 1);
        expect_operation(&mut log, "LOG_BAN_SCRIPTED_USER", 1);
        expect_operation(&mut log, "LOG_BAN_EXCLUDE_SCRIPTED", 1);
        expect_operation(&mut log, "LOG_UNBAN_SCRIPTED", 1);

        let mut manager = single(Arc::new(log));
        manager.set_type("scripted").unwrap();

        assert!(manager.ban().unwrap());
        assert_eq!(manager.exclude().unwrap(), Some(true));
        assert!(manager.remove().unwrap());
    }

    #[test]
    fn test_disabled_log_drops_entries() {
        let mut log = MockLogSink::new();
        expect_operation(&mut log, "LOG_BAN_SCRIPTED", 0);
        expect_operation(&mut log, "LOG_BAN_SCRIPTED_USER", 0);
        expect_operation(&mut log, "LOG_BAN_EXCLUDE_SCRIPTED", 0);
        expect_operation(&mut log, "LOG_UNBAN_SCRIPTED", 1);

        let mut manager = single(Arc::new(log));
        manager.set_type("scripted").unwrap();

        manager.disable_log();
        assert!(!manager.is_log_enabled());
        assert!(manager.ban().unwrap());
        assert_eq!(manager.exclude().unwrap(), Some(true));
        assert!(manager.remove().unwrap());

        // Entries of the unlogged actions must not show up now
        manager.enable_log();
        assert!(manager.remove().unwrap());
    }

    #[test]
    fn test_delegation() {
        let mut registry = BanTypeRegistry::new();
        registry.register(
            "scripted",
            Box::new(ScriptedType::new(CheckResult::Banned, true)),
        );
        registry.register(
            "ban.type.user",
            Box::new(UserBanType::new(BanStore::new(), clock())),
        );
        let mut manager = BanManager::new(registry, quiet_log(), actor(), clock());

        manager.set_type("scripted").unwrap();
        assert!(!manager.is_exclude_possible().unwrap());
        assert_eq!(
            manager.check(&Subject::default()).unwrap(),
            CheckResult::Banned
        );
        assert!(manager.tidy().unwrap());

        manager
            .set_displayed_message("You are banned")
            .unwrap()
            .set_message("spam")
            .unwrap();
        let base = manager.types().get("scripted").unwrap().base();
        assert_eq!(base.displayed_message(), "You are banned");
        assert_eq!(base.message(), "spam");

        manager.set_type("user").unwrap();
        assert!(manager.is_exclude_possible().unwrap());
    }

    #[test]
    fn test_from_config() {
        let config = BanConfig {
            log_enabled: false,
            ..Default::default()
        };
        let store = BanStore::new();
        let mut manager = BanManager::from_config(&config, &store, actor());

        assert!(!manager.is_log_enabled());
        assert_eq!(manager.types().len(), 3);

        manager
            .set_type("ip")
            .unwrap()
            .set_items(["10.0.0.1"])
            .unwrap()
            .ban()
            .unwrap();
        manager
            .set_type("user")
            .unwrap()
            .set_items(["42"])
            .unwrap()
            .exclude()
            .unwrap();

        let visitor = Subject {
            user_id: 7,
            ip: "10.0.0.1".to_string(),
            ..Default::default()
        };
        assert_eq!(manager.check_all(&visitor), CheckResult::Banned);

        let exempt = Subject {
            user_id: 42,
            ..visitor
        };
        assert_eq!(manager.check_all(&exempt), CheckResult::Excluded);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_open_and_save() {
        let data_file = std::env::temp_dir()
            .join(format!("banhammer-manager-{}", uuid::Uuid::new_v4()))
            .join("bans.yaml");
        let config = BanConfig {
            data_file: data_file.display().to_string(),
            ..Default::default()
        };

        let mut manager = BanManager::open(&config, actor()).await.unwrap();
        assert_eq!(manager.types().len(), 3);
        manager
            .set_type("email")
            .unwrap()
            .set_items(["*@spam.example"])
            .unwrap()
            .ban()
            .unwrap();
        manager.save().await.unwrap();
        assert!(data_file.is_file());

        let reopened = BanManager::open(&config, actor()).await.unwrap();
        let visitor = Subject {
            email: "Bot@Spam.Example".to_string(),
            ..Default::default()
        };
        assert_eq!(reopened.check_all(&visitor), CheckResult::Banned);

        if let Some(dir) = data_file.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn test_save_without_data_file_is_a_no_op() {
        let manager = single(quiet_log());
        manager.save().await.unwrap();
    }
}
