use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use registrar_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = match config_file_path.as_deref().map(load_config_file_doc).transpose() {
        Ok(doc) => doc,
        Err(error) => return format!("config file unreadable: {error:#}"),
    };

    let fields: [(&str, String, &[&str]); 10] = [
        ("database.url", config.database.url.clone(), &["REGISTRAR_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["REGISTRAR_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["REGISTRAR_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["REGISTRAR_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["REGISTRAR_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["REGISTRAR_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "approvals.admin_override",
            config.approvals.admin_override.to_string(),
            &["REGISTRAR_APPROVALS_ADMIN_OVERRIDE"],
        ),
        (
            "approvals.auto_dispatch",
            config.approvals.auto_dispatch.to_string(),
            &["REGISTRAR_APPROVALS_AUTO_DISPATCH"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["REGISTRAR_LOGGING_LEVEL", "REGISTRAR_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["REGISTRAR_LOGGING_FORMAT", "REGISTRAR_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {key} = {value} (source: {source})"));
    }

    lines.join("\n")
}

fn load_config_file_doc(path: &Path) -> anyhow::Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    raw.parse::<Value>().with_context(|| format!("failed to parse {}", path.display()))
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
