use std::env;
use std::sync::{Mutex, OnceLock};

use payflow_cli::commands::{config, doctor, migrate, smoke};
use serde_json::Value;

const MEMORY_DB: &[(&str, &str)] =
    &[("PAYFLOW_DATABASE_URL", "sqlite::memory:"), ("PAYFLOW_DATABASE_MAX_CONNECTIONS", "1")];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(MEMORY_DB, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "applied 1 pending migration(s)");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("PAYFLOW_DATABASE_URL", "postgres://localhost/payflow")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_returns_db_failure_when_database_is_unreachable() {
    with_env(&[("PAYFLOW_DATABASE_URL", "sqlite:///payflow-missing-dir/nested/payflow.db")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 4, "expected db connectivity failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "db_connectivity");
    });
}

#[test]
fn smoke_runs_the_approval_lattice_end_to_end() {
    with_env(MEMORY_DB, || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");

        let checks = payload["checks"].as_array().expect("checks");
        let roundtrip = checks
            .iter()
            .find(|check| check["name"] == "approval_roundtrip")
            .expect("roundtrip check");
        assert_eq!(roundtrip["status"], "pass");
        assert!(roundtrip["message"].as_str().unwrap_or_default().contains("approved_all"));
    });
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[("PAYFLOW_LISTING_MAX_PAGE_SIZE", "0")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

#[test]
fn doctor_reports_pending_migrations_on_a_fresh_database() {
    with_env(MEMORY_DB, || {
        let report: Value =
            serde_json::from_str(&doctor::run(true)).expect("doctor output should be JSON");

        assert_eq!(report["overall_status"], "fail");
        let schema = report["checks"]
            .as_array()
            .expect("checks")
            .iter()
            .find(|check| check["name"] == "schema_migrations")
            .expect("schema check");
        assert_eq!(schema["status"], "fail");
        assert!(schema["details"].as_str().unwrap_or_default().contains("payflow migrate"));
    });
}

#[test]
fn config_attributes_env_overrides() {
    with_env(&[("PAYFLOW_LOG_LEVEL", "debug"), ("PAYFLOW_SERVER_PORT", "9191")], || {
        let output = config::run();

        assert!(output.contains("- logging.level = debug (source: env (PAYFLOW_LOG_LEVEL))"));
        assert!(output.contains("- server.port = 9191 (source: env (PAYFLOW_SERVER_PORT))"));
        assert!(output.contains("- listing.max_page_size = 100 (source: default)"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PAYFLOW_DATABASE_URL",
        "PAYFLOW_DATABASE_MAX_CONNECTIONS",
        "PAYFLOW_DATABASE_TIMEOUT_SECS",
        "PAYFLOW_SERVER_BIND_ADDRESS",
        "PAYFLOW_SERVER_PORT",
        "PAYFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PAYFLOW_LOGGING_LEVEL",
        "PAYFLOW_LOGGING_FORMAT",
        "PAYFLOW_LOG_LEVEL",
        "PAYFLOW_LOG_FORMAT",
        "PAYFLOW_LISTING_DEFAULT_PAGE_SIZE",
        "PAYFLOW_LISTING_MAX_PAGE_SIZE",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
