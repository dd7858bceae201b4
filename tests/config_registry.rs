//! Config file → registry wiring.

use std::path::PathBuf;
use std::time::Duration;

use agent_circuit::breaker::{BreakerRegistry, CircuitState, Preset};
use agent_circuit::config::{load_config, ConfigError, LogFormat};

mod common;
use common::{fail, succeed};

const CONFIG: &str = r#"
[observability]
log_level = "debug"
log_format = "json"

[reporter]
interval_secs = 5

[[breakers]]
name = "decision-store"
preset = "sensitive"
volume_threshold = 3

[[breakers]]
name = "message-bus"
preset = "fast"
reset_timeout_ms = 500

[[breakers]]
name = "planner"
"#;

fn write_temp(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{}-{}.toml", name, std::process::id()));
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_config_from_disk() {
    let path = write_temp("agent-circuit-load", CONFIG);
    let config = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.observability.log_level, "debug");
    assert_eq!(config.observability.log_format, LogFormat::Json);
    assert_eq!(config.reporter.interval_secs, 5);
    assert!(config.reporter.enabled);
    assert_eq!(config.breakers.len(), 3);
    assert_eq!(config.breakers[2].preset, Preset::Standard);

    let store = config.breakers[0].resolve();
    assert_eq!(store.name, "decision-store");
    assert_eq!(store.failure_threshold, 3);
    assert_eq!(store.volume_threshold, 3);
    assert_eq!(store.timeout_ms, 5_000);
}

#[test]
fn test_invalid_config_reports_every_problem() {
    let path = write_temp(
        "agent-circuit-invalid",
        r#"
[[breakers]]
name = "store"
failure_threshold = 0

[[breakers]]
name = "store"
"#,
    );
    let err = load_config(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();

    match err {
        ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let err = load_config(&std::env::temp_dir().join("agent-circuit-does-not-exist.toml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[tokio::test(start_paused = true)]
async fn test_registry_breakers_follow_their_config() {
    let path = write_temp("agent-circuit-registry", CONFIG);
    let config = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let registry = BreakerRegistry::from_specs(&config.breakers);
    assert_eq!(registry.names(), vec!["decision-store", "message-bus", "planner"]);

    let bus = registry.get("message-bus").unwrap();
    assert_eq!(bus.config().reset_timeout(), Duration::from_millis(500));

    // fast preset keeps the standard volume threshold of 10
    for _ in 0..10 {
        fail(&bus).await.unwrap_err();
    }
    assert_eq!(bus.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(500)).await;
    succeed(&bus).await.unwrap();
    // success_threshold 1 for the fast preset
    assert_eq!(bus.state(), CircuitState::Closed);

    let health = registry.health();
    assert_eq!(health.len(), 3);
    assert!(health.iter().all(|h| h.state == CircuitState::Closed));
}
