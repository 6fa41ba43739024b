//! Integration tests for the logging system

use bridge_traits::time::{ConsoleLogger, LogLevel, LoggerSink};
use core_runtime::logging::{
    describe_value, init_logging, redact_if_sensitive, LogFormat, LoggingConfig,
};
use std::sync::Arc;

#[test]
fn test_init_logging_once_per_process() {
    // Only one global subscriber may be installed; the second attempt must
    // surface a configuration error instead of panicking.
    let sink: Arc<dyn LoggerSink> = Arc::new(ConsoleLogger {
        min_level: LogLevel::Error,
    });
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_logger_sink(sink);

    let first = init_logging(config.clone());
    assert!(first.is_ok());

    tracing::warn!(store = "kv-a", "logging initialised");

    let second = init_logging(config);
    assert!(second.is_err());
}

#[test]
fn test_redaction_of_secret_fields() {
    for field in ["value", "target_value", "secret", "client_secret", "password"] {
        assert_eq!(redact_if_sensitive(field, "hunter2"), "[REDACTED]", "{}", field);
    }
}

#[test]
fn test_non_secret_fields_pass_through() {
    assert_eq!(redact_if_sensitive("name", "db-password"), "db-password");
    assert_eq!(redact_if_sensitive("store", "kv-prod"), "kv-prod");
    assert_eq!(redact_if_sensitive("failed", "3"), "3");
}

#[test]
fn test_value_description_never_leaks_content() {
    let described = describe_value(Some("s3cr3t"));
    assert_eq!(described, "<6 chars>");
    assert!(!described.contains("s3cr3t"));
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LogFormat::default(), LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LogFormat::default(), LogFormat::Json);
}
