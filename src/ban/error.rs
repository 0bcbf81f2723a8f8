//! Error types for the ban system
//!
//! This module defines the errors that can occur while selecting, configuring
//! and applying ban types.

use thiserror::Error;

/// Errors that can occur during ban operations
#[derive(Debug, Error)]
pub enum BanError {
    /// An operation needed a ban type but none was selected
    #[error("No ban type selected")]
    NoBanType,

    /// The requested ban type is not registered
    #[error("Invalid ban type: {type_name}")]
    InvalidBanType { type_name: String },

    /// The ban end is not a moment in the future
    #[error("Invalid ban end: {value}")]
    InvalidBanEnd {
        value: String,
        #[source]
        source: Option<chrono::ParseError>,
    },

    /// An item could not be interpreted by the selected ban type
    #[error("Invalid ban item: {0}")]
    InvalidItem(String),

    /// Reading or writing the ban store failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ban store could not be (de)serialized
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BanError {
    /// Create an invalid ban end error without an underlying cause
    pub fn invalid_ban_end(value: impl ToString) -> Self {
        Self::InvalidBanEnd {
            value: value.to_string(),
            source: None,
        }
    }
}

/// Result type for ban operations
pub type BanResult<T> = Result<T, BanError>;
