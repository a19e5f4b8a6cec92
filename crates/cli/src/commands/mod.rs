pub mod config;
pub mod migrate;
pub mod requests;
pub mod stages;

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use registrar_core::approvals::PermissionPolicy;
use registrar_core::audit::TracingAuditSink;
use registrar_core::config::{AppConfig, LoadOptions};
use registrar_core::errors::ApplicationError;
use registrar_core::flows::StageEngine;
use registrar_db::{connect_with_config, migrations, ApprovalService, SqlRequestRepository};

pub(crate) type StoreService = ApprovalService<SqlRequestRepository, TracingAuditSink>;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::ok(command, message.into(), None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::ok(command, message.into(), Some(value)),
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn ok(command: &str, message: String, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }
}

/// Maps service failures onto an error class and process exit code.
pub(crate) fn application_failure(command: &str, error: ApplicationError) -> CommandResult {
    let exit_code = match &error {
        ApplicationError::Domain(_) => 6,
        ApplicationError::NotFound(_) => 7,
        ApplicationError::Conflict { .. } => 8,
        ApplicationError::Persistence(_) => 9,
        ApplicationError::Configuration(_) => 2,
    };
    CommandResult::failure(command, error.code(), error.to_string(), exit_code)
}

pub(crate) fn correlation_id() -> String {
    format!("cli-{}", uuid::Uuid::new_v4())
}

/// Loads configuration, opens and migrates the store, then drives `action`
/// to completion on a single-threaded runtime.
pub(crate) fn with_service<F, Fut>(command: &str, action: F) -> CommandResult
where
    F: FnOnce(StoreService) -> Fut,
    Fut: Future<Output = CommandResult>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return CommandResult::failure(command, "db_connectivity", error.to_string(), 4);
            }
        };
        if let Err(error) = migrations::run_pending(&pool).await {
            return CommandResult::failure(command, "migration", error.to_string(), 5);
        }

        let service = ApprovalService::new(
            SqlRequestRepository::new(pool.clone()),
            StageEngine::new(PermissionPolicy::new(config.approvals.admin_override)),
            TracingAuditSink,
            config.approvals.auto_dispatch,
        );
        let result = action(service).await;
        pool.close().await;
        result
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
