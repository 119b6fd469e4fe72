//! Structured logging infrastructure for CAT services.
//!
//! Centralised `tracing` initialisation with optional JSON output. The level
//! comes from `RUST_LOG` when set, otherwise from [`LogSettings::level`].

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogSettings;

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the logging system with human-readable output.
///
/// # Example
/// ```no_run
/// use cat_core::logging;
///
/// logging::init("info");
/// tracing::info!("CA started");
/// ```
pub fn init(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize the logging system with JSON output for log aggregation.
///
/// # Example
/// ```no_run
/// use cat_core::logging;
///
/// logging::init_json("info");
/// tracing::info!(service_type = "billing", "Service started");
/// ```
pub fn init_json(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize from configuration.
pub fn init_from_settings(settings: &LogSettings) {
    if settings.json {
        init_json(&settings.level);
    } else {
        init(&settings.level);
    }
}

/// Like [`init`], but returns `false` instead of panicking when a global
/// subscriber is already installed. Intended for tests.
pub fn try_init(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}
