pub mod ban;
pub mod config;
pub mod logging;

pub const MANAGER_TARGET: &str = "banhammer::manager";
pub const BAN_LOG_TARGET: &str = "banhammer::ban_log";

pub use ban::{
    BanEnd, BanError, BanManager, BanResult, BanStore, BanType, BanTypeRegistry, CheckResult,
    Subject,
};
pub use config::BanConfig;
