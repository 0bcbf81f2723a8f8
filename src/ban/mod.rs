//! Ban system
//!
//! Bans and exclusions are applied through interchangeable ban types. The
//! [`BanManager`] selects one of them by name, configures it, runs actions on
//! it and forwards what it logged to a [`LogSink`].

mod check;
mod clock;
mod error;
mod events;
mod log;
mod manager;
mod registry;
mod store;
mod types;

pub use check::CheckResult;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BanError, BanResult};
pub use events::{BanListener, EventDispatcher, SetItemsEvent, SetTypeEvent};
pub use log::{Actor, ActorSource, LogData, LogEntry, LogMode, LogSink, TracingLogSink};
pub use manager::{BanEnd, BanManager};
pub use registry::{BanTypeRegistry, TYPE_PREFIX};
pub use store::{BanRecord, BanStore};
pub use types::{
    ANONYMOUS_USER_ID, BanType, BanTypeBase, EmailBanType, IpBanType, Subject, UserBanType,
};

#[cfg(test)]
pub use log::{MockActorSource, MockLogSink};
