use std::env;
use std::fs;
use std::path::Path;

use payflow_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: [(&str, String, &[&str]); 11] = [
        ("database.url", config.database.url.clone(), &["PAYFLOW_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["PAYFLOW_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["PAYFLOW_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["PAYFLOW_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["PAYFLOW_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["PAYFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["PAYFLOW_LOGGING_LEVEL", "PAYFLOW_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["PAYFLOW_LOGGING_FORMAT", "PAYFLOW_LOG_FORMAT"],
        ),
        (
            "listing.default_page_size",
            config.listing.default_page_size.to_string(),
            &["PAYFLOW_LISTING_DEFAULT_PAGE_SIZE"],
        ),
        (
            "listing.max_page_size",
            config.listing.max_page_size.to_string(),
            &["PAYFLOW_LISTING_MAX_PAGE_SIZE"],
        ),
        ("capabilities.grants", grant_summary(&config), &[]),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        lines.push(render_line(
            key,
            &value,
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    }

    lines.join("\n")
}

fn grant_summary(config: &AppConfig) -> String {
    let mut actors: Vec<String> = config
        .capabilities
        .grants
        .iter()
        .map(|grant| format!("{}@{}", grant.actor_id, grant.tenant_id))
        .collect();
    actors.sort();
    actors.dedup();

    if actors.is_empty() {
        "0 grant(s)".to_string()
    } else {
        format!("{} grant(s) for {}", config.capabilities.grants.len(), actors.join(", "))
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::{contains_path, field_source};
    use toml::Value;

    #[test]
    fn file_source_requires_the_full_key_path() {
        let doc: Value = "[listing]\nmax_page_size = 50\n".parse().expect("toml");

        assert!(contains_path(&doc, "listing.max_page_size"));
        assert!(!contains_path(&doc, "listing.default_page_size"));
        assert!(!contains_path(&doc, "capabilities.grants"));
    }

    #[test]
    fn missing_env_and_file_fall_back_to_default() {
        let source = field_source("server.port", &["PAYFLOW_CONFIG_TEST_UNSET_KEY"], None, None);
        assert_eq!(source, "default");
    }

    #[test]
    fn array_of_tables_counts_as_a_file_source() {
        let doc: Value = "[[capabilities.grants]]\nactor_id = \"u-1\"\ntenant_id = \"t-1\"\nroles = [\"requester\"]\n"
            .parse()
            .expect("toml");

        let source = field_source("capabilities.grants", &[], Some(&doc), None);
        assert_eq!(source, "file (config file)");
    }
}
