use serde::Serialize;

use crate::commands::CommandResult;
use registrar_core::config::{AppConfig, LoadOptions};
use registrar_db::{connect_with_config, migrations};

#[derive(Debug, Serialize)]
struct MigrationReport {
    database_url: String,
    known_migrations: usize,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
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
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success_with_data(
            "migrate",
            "applied pending migrations",
            &MigrationReport {
                database_url: config.database.url,
                known_migrations: migrations::MIGRATOR
                    .iter()
                    .filter(|migration| migration.migration_type.is_up_migration())
                    .count(),
            },
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
