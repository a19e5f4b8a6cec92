use std::sync::Arc;

use registrar_core::approvals::PermissionPolicy;
use registrar_core::audit::TracingAuditSink;
use registrar_core::config::AppConfig;
use registrar_core::flows::StageEngine;
use registrar_db::{connect_with_config, migrations, ApprovalService, DbPool, SqlRequestRepository};
use thiserror::Error;
use tracing::info;

pub type SharedService = Arc<ApprovalService<SqlRequestRepository, TracingAuditSink>>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: SharedService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let service = Arc::new(ApprovalService::new(
        SqlRequestRepository::new(db_pool.clone()),
        StageEngine::new(PermissionPolicy::new(config.approvals.admin_override)),
        TracingAuditSink,
        config.approvals.auto_dispatch,
    ));
    info!(
        event_name = "system.bootstrap.approvals_ready",
        correlation_id = "bootstrap",
        admin_override = config.approvals.admin_override,
        auto_dispatch = config.approvals.auto_dispatch,
        "approval service initialized"
    );

    Ok(Application { config, db_pool, service })
}

#[cfg(test)]
mod tests {
    use registrar_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use registrar_core::domain::actor::{Actor, Role};
    use registrar_core::domain::request::{NewRequest, RequestStatus, RequestType};
    use registrar_core::flows::TransitionRequest;

    use crate::bootstrap::{bootstrap_with_config, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_when_database_cannot_be_opened() {
        let result =
            bootstrap_with_config(config("sqlite:///registrar-missing-dir/nested/registrar.db"))
                .await;

        assert!(matches!(result, Err(BootstrapError::DatabaseConnect(_))));
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_schema_and_excuse_chain() {
        let app = bootstrap_with_config(config("sqlite::memory:"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('academic_request', 'approval_entry')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected request tables to be available after bootstrap");
        assert_eq!(table_count, 2, "bootstrap should expose request tables");

        let record = app
            .service
            .submit(
                NewRequest {
                    request_type: RequestType::Excuse,
                    requester_id: "stu-11".to_string(),
                    requester_name: "Ifeoma Okoro".to_string(),
                    summary: "Hospitalised during mid-semester test".to_string(),
                },
                "smoke",
            )
            .await
            .expect("submit");
        assert_eq!(record.current_stage_index, 1, "auto dispatch is on by default");

        for role in [Role::Lecturer, Role::Hod, Role::Dean, Role::Vc] {
            let actor = Actor::new(format!("{}-1", role.as_str()), "Approver", role);
            app.service
                .decide(&record.id, TransitionRequest::approve(actor, None), "smoke")
                .await
                .unwrap_or_else(|error| panic!("{role} approval should succeed: {error}"));
        }

        let stored = app.service.get(&record.id).await.expect("get");
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.current_stage_index, 5);
        let roles: Vec<Role> = stored.approvals.iter().map(|entry| entry.approver_role).collect();
        assert_eq!(roles, vec![Role::Lecturer, Role::Hod, Role::Dean, Role::Vc]);

        app.db_pool.close().await;
    }

    fn config(database_url: &str) -> AppConfig {
        AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config should load")
    }
}
