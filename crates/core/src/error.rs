//! Setup error types.
//!
//! Everything in here is fatal at startup or first use: a missing root key or
//! service name is an operator mistake, never something to retry.

use thiserror::Error;

/// Configuration and setup error.
#[derive(Debug, Error)]
pub enum Error {
    /// A required setting was left empty
    #[error("`{0}` must be set")]
    MissingSetting(&'static str),

    /// A setting holds a value that cannot be used
    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`crate::CatConfig`]
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for setup operations.
pub type Result<T> = std::result::Result<T, Error>;
