use crate::BAN_LOG_TARGET;
use crate::config::BanConfig;
use std::path::Path;
use tracing::{Level, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::Targets,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log directory name
pub const LOG_DIR: &str = "logs";
/// Ban log file name
pub const BAN_LOG_FILE: &str = "bans";

/// Initialize the logging system with console and file outputs
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed
pub fn init(config: &BanConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let log_dir = Path::new(&config.log_dir);

    // Create log directory if it doesn't exist
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    // Only ban log entries go to the daily rotated JSON file
    let ban_file = RollingFileAppender::new(Rotation::DAILY, log_dir, BAN_LOG_FILE);

    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(true);

    let ban_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(ban_file)
        .with_filter(Targets::new().with_target(BAN_LOG_TARGET, Level::INFO));

    // Default to INFO level if RUST_LOG is not set
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(ban_layer)
        .try_init()?;

    info!(log_dir = %log_dir.display(), "Logging system initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ban::{LogMode, LogSink, TracingLogSink};

    #[test]
    fn test_init_writes_only_ban_entries_to_file() {
        let log_dir = std::env::temp_dir().join(format!("banhammer-logs-{}", uuid::Uuid::new_v4()));
        let config = BanConfig {
            log_dir: log_dir.display().to_string(),
            ..Default::default()
        };

        init(&config).unwrap();
        assert!(log_dir.is_dir());

        // A second subscriber is refused
        assert!(init(&config).is_err());

        info!("unrelated-event-marker");
        TracingLogSink.add(
            LogMode::Admin,
            2,
            "127.0.0.1",
            "LOG_BAN_USER",
            false,
            &["spam".to_string()],
        );

        let mut contents = String::new();
        for entry in std::fs::read_dir(&log_dir).unwrap() {
            contents.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
        }

        assert!(contents.contains("LOG_BAN_USER"));
        assert!(!contents.contains("unrelated-event-marker"));
        assert!(!contents.contains("Logging system initialized"));
        for line in contents.lines() {
            assert!(line.contains(BAN_LOG_TARGET), "unexpected line: {line}");
        }

        let _ = std::fs::remove_dir_all(&log_dir);
    }
}
