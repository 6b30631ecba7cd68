//! Viewer configuration using Figment
//!
//! Configuration is layered, lowest precedence first:
//! 1. built-in defaults ([`ViewerConfig::default`]),
//! 2. a TOML file (`config/viewer.toml` unless a path is given),
//! 3. environment variables prefixed with `SHMVIEW_`.
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! SHMVIEW_APPLICATION__LOG_LEVEL=debug
//! SHMVIEW_DISPLAY__POLL_RATE=50hz
//! SHMVIEW_AUTOSCALE__GAIN=0.2
//! SHMVIEW_TRACE__ENABLED=true
//! ```
//!
//! # Example
//!
//! ```no_run
//! use shm_viewer::config::ViewerConfig;
//!
//! fn main() -> shm_viewer::error::AppResult<()> {
//!     let config = ViewerConfig::load()?;
//!     println!("Polling at {}", config.display.poll_rate);
//!     Ok(())
//! }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::autoscale::{
    AutoscaleConfig, AutoscaleSource, HighMode, LowMode, DEFAULT_PERCENTILE_BINS,
};
use crate::error::{AppResult, ViewerError};
use crate::geometry::DEFAULT_ZOOM_STEP;
use crate::limits::{trace_storage_bytes, MAX_HIST_BINS};
use crate::poll::PollRate;
use crate::stats::DEFAULT_HIST_BINS;
use crate::trace::{DEFAULT_TRACE_CAPACITY, DEFAULT_TRACE_HIST_BINS, DEFAULT_TRACE_WINDOW_SECS};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/viewer.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SHMVIEW_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 2] = ["pretty", "json"];

/// Top-level viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ViewerConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Display refresh and histogram settings
    pub display: DisplayConfig,
    /// Initial autoscale settings
    pub autoscale: AutoscaleSettings,
    /// Trace recorder sizing
    pub trace: TraceConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "shm-viewer".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Bins of the display histograms
    pub hist_bins: usize,
    /// How often the producer is polled
    pub poll_rate: PollRate,
    /// Zoom factor per scroll notch
    pub zoom_step: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            hist_bins: DEFAULT_HIST_BINS,
            poll_rate: PollRate::default(),
            zoom_step: DEFAULT_ZOOM_STEP,
        }
    }
}

/// Autoscale configuration applied at start-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscaleSettings {
    /// Initial lower limit policy
    pub low_mode: LowMode,
    /// Initial upper limit policy
    pub high_mode: HighMode,
    /// Pixels the automatic limits come from
    pub source: AutoscaleSource,
    /// Smoothing gain in `[0, 1]`
    pub gain: f64,
    /// Bins of the histogram used for percentile cuts
    pub percentile_bins: usize,
    /// Manual lower limit
    pub manual_low: f64,
    /// Manual upper limit
    pub manual_high: f64,
}

impl Default for AutoscaleSettings {
    fn default() -> Self {
        let defaults = AutoscaleConfig::default();
        Self {
            low_mode: defaults.low_mode,
            high_mode: defaults.high_mode,
            source: defaults.source,
            gain: defaults.gain,
            percentile_bins: DEFAULT_PERCENTILE_BINS,
            manual_low: defaults.manual_low,
            manual_high: defaults.manual_high,
        }
    }
}

impl AutoscaleSettings {
    /// Runtime autoscale settings for these values
    #[must_use]
    pub fn to_autoscale_config(&self) -> AutoscaleConfig {
        AutoscaleConfig {
            low_mode: self.low_mode,
            high_mode: self.high_mode,
            source: self.source,
            gain: self.gain,
            manual_low: self.manual_low,
            manual_high: self.manual_high,
        }
    }
}

/// Trace recorder configuration
///
/// The ring is allocated in full when the viewer is built, even with
/// `enabled = false`: `capacity * (hist_bins * 4 + 72)` bytes, about 395 MB for
/// the defaults (360000 samples of 256 bins). Lower `capacity` or `hist_bins`
/// on memory-constrained hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Start recording immediately
    pub enabled: bool,
    /// Samples kept before the oldest is overwritten
    pub capacity: usize,
    /// Bins per stored histogram
    pub hist_bins: usize,
    /// Window shown by default, in seconds
    pub default_window_secs: f64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: DEFAULT_TRACE_CAPACITY,
            hist_bins: DEFAULT_TRACE_HIST_BINS,
            default_window_secs: DEFAULT_TRACE_WINDOW_SECS,
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl ViewerConfig {
    /// Load configuration from `config/viewer.toml` and the environment
    ///
    /// A missing file is not an error; defaults and environment overrides still
    /// apply.
    ///
    /// # Errors
    ///
    /// Returns a `ViewerError` if a source cannot be parsed or validation fails.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// # Errors
    ///
    /// Returns a `ViewerError` if the file is malformed, a value has the wrong
    /// type, or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "configuration loaded");
        Ok(config)
    }

    /// The layered provider stack, exposed for callers that merge extra sources.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level and log format are known
    /// - Histogram sizes are positive and bounded
    /// - Autoscale gain lies in `[0, 1]` and manual limits are ordered
    /// - Trace capacity and default window are positive, and the pre-allocated
    ///   trace storage stays within [`crate::limits::MAX_TRACE_BYTES`]
    /// - The scroll zoom step actually zooms
    ///
    /// # Errors
    ///
    /// Returns `ViewerError::Configuration` describing the first failure.
    pub fn validate(&self) -> AppResult<()> {
        let app = &self.application;
        if !VALID_LOG_LEVELS.contains(&app.log_level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                app.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }
        if !VALID_LOG_FORMATS.contains(&app.log_format.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                app.log_format,
                VALID_LOG_FORMATS.join(", ")
            )));
        }

        check_bins("display.hist_bins", self.display.hist_bins)?;
        check_bins("trace.hist_bins", self.trace.hist_bins)?;
        if !(self.display.zoom_step > 1.0) || !self.display.zoom_step.is_finite() {
            return Err(invalid(format!(
                "Invalid display.zoom_step {}. Must be a finite number greater than 1",
                self.display.zoom_step
            )));
        }

        let scale = &self.autoscale;
        if scale.percentile_bins < 2 || scale.percentile_bins > MAX_HIST_BINS {
            return Err(invalid(format!(
                "Invalid autoscale.percentile_bins {}. Must be 2-{}",
                scale.percentile_bins, MAX_HIST_BINS
            )));
        }
        if !(0.0..=1.0).contains(&scale.gain) {
            return Err(invalid(format!(
                "Invalid autoscale.gain {}. Must be within [0, 1]",
                scale.gain
            )));
        }
        if !(scale.manual_high > scale.manual_low) {
            return Err(invalid(format!(
                "Invalid manual limits: manual_high ({}) must exceed manual_low ({})",
                scale.manual_high, scale.manual_low
            )));
        }

        if self.trace.capacity == 0 {
            return Err(invalid("Invalid trace.capacity 0. Must be > 0".to_string()));
        }
        if let Err(err) = trace_storage_bytes(self.trace.capacity, self.trace.hist_bins) {
            return Err(invalid(format!(
                "Invalid trace.capacity {} with trace.hist_bins {}: {err}",
                self.trace.capacity, self.trace.hist_bins
            )));
        }
        if !(self.trace.default_window_secs > 0.0) {
            return Err(invalid(format!(
                "Invalid trace.default_window_secs {}. Must be > 0",
                self.trace.default_window_secs
            )));
        }

        Ok(())
    }

    /// Render as TOML, e.g. to write a default configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ViewerError::Configuration` if serialization fails.
    pub fn to_toml_string(&self) -> AppResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| invalid(format!("Failed to serialize configuration: {e}")))
    }
}

fn invalid(message: String) -> ViewerError {
    ViewerError::Configuration(message)
}

fn check_bins(key: &str, bins: usize) -> AppResult<()> {
    if bins == 0 || bins > MAX_HIST_BINS {
        return Err(invalid(format!(
            "Invalid {key} {bins}. Must be 1-{MAX_HIST_BINS}"
        )));
    }
    Ok(())
}
