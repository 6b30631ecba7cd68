//! Configuration loading from files and environment overrides.

use std::fs;
use std::path::Path;

use serial_test::serial;
use shm_viewer::autoscale::{AutoscaleSource, HighMode, LowMode};
use shm_viewer::config::ViewerConfig;
use shm_viewer::poll::PollRate;
use shm_viewer::ViewerError;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("viewer.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
#[serial]
fn test_partial_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[display]
hist_bins = 128
poll_rate = "50hz"

[autoscale]
low_mode = "p2"
high_mode = "p98"
source = "roi"
gain = 0.5
"#,
    );

    let config = ViewerConfig::load_from(&path).unwrap();
    assert_eq!(config.display.hist_bins, 128);
    assert_eq!(config.display.poll_rate, PollRate::Hz50);
    assert_eq!(config.autoscale.low_mode, LowMode::P2);
    assert_eq!(config.autoscale.high_mode, HighMode::P98);
    assert_eq!(config.autoscale.source, AutoscaleSource::Roi);
    assert_eq!(config.autoscale.gain, 0.5);
    // Untouched sections fall back to defaults
    assert_eq!(config.application, ViewerConfig::default().application);
    assert_eq!(config.trace, ViewerConfig::default().trace);
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let config = ViewerConfig::load_from(dir.path().join("absent.toml"))?;
    assert_eq!(config, ViewerConfig::default());
    Ok(())
}

#[test]
#[serial]
fn test_shipped_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/viewer.toml");
    let config = ViewerConfig::load_from(path).unwrap();
    assert_eq!(config, ViewerConfig::default());
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[autoscale]\ngain = 0.5\n");

    std::env::set_var("SHMVIEW_AUTOSCALE__GAIN", "0.25");
    std::env::set_var("SHMVIEW_DISPLAY__POLL_RATE", "100hz");
    std::env::set_var("SHMVIEW_TRACE__ENABLED", "true");
    let result = ViewerConfig::load_from(&path);
    std::env::remove_var("SHMVIEW_AUTOSCALE__GAIN");
    std::env::remove_var("SHMVIEW_DISPLAY__POLL_RATE");
    std::env::remove_var("SHMVIEW_TRACE__ENABLED");

    let config = result.unwrap();
    assert_eq!(config.autoscale.gain, 0.25);
    assert_eq!(config.display.poll_rate, PollRate::Hz100);
    assert!(config.trace.enabled);
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[trace]\ncapacity = 0\n");

    let err = ViewerConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ViewerError::Configuration(_)));
    assert!(err.to_string().contains("trace.capacity"));
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[display]\nhist_bins = \"many\"\n");

    let err = ViewerConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ViewerError::Config(_)));
}

#[test]
#[serial]
fn test_written_defaults_load_back() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let text = ViewerConfig::default().to_toml_string()?;
    let path = write_config(&dir, &text);

    assert_eq!(ViewerConfig::load_from(&path)?, ViewerConfig::default());
    Ok(())
}
