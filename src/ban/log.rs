//! Log entries produced by ban types and the sinks that receive them
//!
//! Ban types buffer [`LogEntry`] values grouped by [`LogMode`]. After each
//! mutating operation the manager drains the buffer and hands every entry to
//! a [`LogSink`] together with the acting user.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::BAN_LOG_TARGET;

/// Log category an entry is written to
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LogMode {
    #[display("admin")]
    Admin,
    #[display("user")]
    User,
}

/// A single operation recorded by a ban type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Operation identifier, e.g. `LOG_BAN_USER`
    pub operation: String,
    /// Additional data passed through to the sink
    pub data: Vec<String>,
}

impl LogEntry {
    pub fn new(operation: impl Into<String>, data: Vec<String>) -> Self {
        Self {
            operation: operation.into(),
            data,
        }
    }
}

/// Log entries grouped by mode, iterated in a stable order
pub type LogData = BTreeMap<LogMode, Vec<LogEntry>>;

/// The user performing a ban operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: u64,
    pub ip: String,
}

impl Actor {
    pub fn new(user_id: u64, ip: impl Into<String>) -> Self {
        Self {
            user_id,
            ip: ip.into(),
        }
    }
}

/// Supplies the acting user at the moment an operation is logged
#[cfg_attr(test, mockall::automock)]
pub trait ActorSource: Send + Sync {
    fn actor(&self) -> Actor;
}

/// An actor that never changes, e.g. a system account
impl ActorSource for Actor {
    fn actor(&self) -> Actor {
        self.clone()
    }
}

/// Destination for ban log entries
#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send + Sync {
    /// Record one entry. Failures are the sink's own concern.
    fn add(
        &self,
        mode: LogMode,
        user_id: u64,
        ip: &str,
        operation: &str,
        admin_only: bool,
        data: &[String],
    );
}

/// Sink that writes every entry as a structured tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn add(
        &self,
        mode: LogMode,
        user_id: u64,
        ip: &str,
        operation: &str,
        admin_only: bool,
        data: &[String],
    ) {
        info!(
            target: BAN_LOG_TARGET,
            mode = %mode,
            user_id = %user_id,
            ip = %ip,
            operation = %operation,
            admin_only = admin_only,
            data = ?data,
            event = "ban_log",
            "Ban log entry"
        );
    }
}
