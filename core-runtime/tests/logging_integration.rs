//! Integration tests for logging system

use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, strip_path, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl LoggerSink for CollectingSink {
    fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// Global subscriber installation can only happen once per process, so all
// assertions about it live in this single test.
#[test]
fn test_init_logging_installs_once_and_forwards() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).expect("first init succeeds");
    assert!(matches!(init_logging(config), Err(Error::Internal(_))));

    tracing::debug!(target: "core_playback", stream = "a.flac", "metadata read");
    tracing::trace!(target: "core_playback", "filtered out");

    let entries = sink.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "metadata read");
    assert_eq!(entries[0].fields.get("stream"), Some(&"a.flac".to_string()));
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(true)
        .with_target(false)
        .with_thread_info(false);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(config.enable_spans);
    assert!(!config.display_target);
    assert!(!config.display_thread_info);
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/music/album/01.flac"), "01.flac");
    assert_eq!(strip_path("D:\\music\\02.flac"), "02.flac");
    assert_eq!(strip_path(""), "");
}
