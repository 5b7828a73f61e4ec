//! Process bootstrap shared by the binaries: tracing, database, migrations
//! and the wired [`BackOffice`].

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::application::BackOffice;
use crate::config::{AppConfig, LogFormat};
use crate::domain::RepositoryProvider;
use crate::infrastructure::database::{init_database, run_migrations, SeaOrmRepositoryProvider};
use crate::shared::errors::{AppError, InfraError};

/// Initialize tracing from the logging section. `RUST_LOG` wins over
/// `level_override`, which wins over the configured level.
pub fn init_tracing(config: &AppConfig, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// A connected, migrated store and the facade built on it.
pub struct Runtime {
    pub config: AppConfig,
    pub db: DatabaseConnection,
    pub repos: Arc<dyn RepositoryProvider>,
    pub back_office: BackOffice,
}

impl Runtime {
    /// Validate the config, connect, apply migrations and repair rentals
    /// created without a root.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;
        let db = init_database(&config.database_config())
            .await
            .map_err(InfraError::from)?;
        run_migrations(&db).await.map_err(InfraError::from)?;

        let repos: Arc<dyn RepositoryProvider> =
            Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
        let backfilled = repos.rentals().backfill_roots().await?;
        if backfilled > 0 {
            warn!(rentals = backfilled, "Backfilled missing rental roots");
        }

        let back_office = BackOffice::new(repos.clone(), &config)?;
        info!(timezone = %config.calendar.timezone, "Back office ready");
        Ok(Self {
            config,
            db,
            repos,
            back_office,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config
    }

    #[tokio::test]
    async fn starts_on_empty_database() {
        let runtime = Runtime::start(memory_config()).await.unwrap();
        let report = runtime
            .back_office
            .reconcile_battery_status(None, true)
            .await
            .unwrap();
        assert!(report.is_empty());
        assert!(report.dry_run);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_connecting() {
        let mut config = memory_config();
        config.access.moderator_allowed_entities.clear();
        assert!(matches!(
            Runtime::start(config).await,
            Err(AppError::Infra(_))
        ));
    }
}
