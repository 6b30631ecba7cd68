//! Tracing subscriber set-up.
//!
//! `RUST_LOG` wins when set; otherwise the filter comes from
//! `application.log_level`, scoped so dependencies stay at `warn`.

use tracing::Subscriber;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::ViewerConfig;
use crate::error::{AppResult, ViewerError};

/// A subscriber ready to be installed or scoped.
pub type BoxedSubscriber = Box<dyn Subscriber + Send + Sync + 'static>;

/// Filter used when `RUST_LOG` is unset.
#[must_use]
pub fn default_filter(level: &str) -> String {
    format!("warn,shm_viewer={}", level.to_lowercase())
}

/// Filter from an explicit `RUST_LOG` value, else from the configured level.
///
/// An unparsable `RUST_LOG` falls back to the configured level.
///
/// # Errors
///
/// Returns `ViewerError::Logging` if the configured level does not parse.
pub fn filter_for(rust_log: Option<&str>, level: &str) -> AppResult<EnvFilter> {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(default_filter(level))
        .map_err(|e| ViewerError::Logging(format!("invalid log filter: {e}")))
}

/// Build, without installing, the subscriber described by `config`.
///
/// # Errors
///
/// Returns `ViewerError::Logging` if the filter is malformed.
pub fn build_subscriber(config: &ViewerConfig) -> AppResult<BoxedSubscriber> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_for(rust_log.as_deref(), &config.application.log_level)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.application.log_format.eq_ignore_ascii_case("json") {
        Ok(Box::new(builder.json().finish()))
    } else {
        Ok(Box::new(builder.finish()))
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns `ViewerError::Logging` if the filter is malformed or a global
/// subscriber is already installed.
pub fn init_from_config(config: &ViewerConfig) -> AppResult<()> {
    build_subscriber(config)?
        .try_init()
        .map_err(|e| ViewerError::Logging(e.to_string()))?;

    tracing::info!(
        name = %config.application.name,
        level = %config.application.log_level,
        format = %config.application.log_format,
        "logging initialised"
    );
    Ok(())
}
