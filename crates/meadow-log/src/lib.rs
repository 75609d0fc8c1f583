//! Structured logging for the Meadow simulation core.
//!
//! Installs a `tracing` subscriber with an environment-aware filter, a
//! console layer, and an optional JSON file layer for post-session analysis.
//! The filter is taken from `RUST_LOG` when set, otherwise from the
//! configuration's `debug.log_level`.

use std::path::Path;

use meadow_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config supply one.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log file written inside the log directory.
pub const LOG_FILE_NAME: &str = "meadow.log";

/// Build the filter directive string from an optional config.
///
/// A config with an empty `log_level` falls back to [`DEFAULT_FILTER`].
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Initialize the global tracing subscriber.
///
/// # Arguments
///
/// * `log_dir` - Directory for the JSON log file
/// * `config` - Optional configuration for level and JSON-file settings
///
/// The JSON file layer is added only when `config.debug.log_json` is set and
/// `log_dir` can be created. Calling this twice is harmless: the second
/// installation attempt is ignored.
pub fn init_logging(log_dir: Option<&Path>, config: Option<&Config>) {
    let filter_str = filter_directive(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let want_json = config.is_some_and(|c| c.debug.log_json);
    if want_json
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        let _ = subscriber.with(file_layer).try_init();
        return;
    }

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults_without_config() {
        assert_eq!(filter_directive(None), "info");
    }

    #[test]
    fn test_filter_follows_config_level() {
        let mut config = Config::default();
        config.debug.log_level = "debug,meadow_net=trace".to_string();
        assert_eq!(filter_directive(Some(&config)), "debug,meadow_net=trace");
    }

    #[test]
    fn test_empty_config_level_falls_back() {
        let mut config = Config::default();
        config.debug.log_level.clear();
        assert_eq!(filter_directive(Some(&config)), DEFAULT_FILTER);
    }

    #[test]
    fn test_subsystem_filters_parse() {
        for filter_str in ["info", "warn,meadow_net=debug", "debug,meadow_sim=trace"] {
            assert!(
                EnvFilter::try_new(filter_str).is_ok(),
                "Failed to parse filter: {filter_str}"
            );
        }
    }

    #[test]
    fn test_json_log_file_created() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.debug.log_json = true;

        init_logging(Some(temp_dir.path()), Some(&config));
        tracing::info!("hello from the log test");

        // Another test may have installed the global subscriber first; the
        // file is still created before installation is attempted.
        assert!(temp_dir.path().join(LOG_FILE_NAME).exists());
    }
}
