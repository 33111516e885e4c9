/// Application context and dependency injection
use crate::{
    attachment_store::DiskAttachmentBackend,
    config::ServerConfig,
    db,
    error::{CatalogError, CatalogResult},
    films::{FilmService, SqliteFilmRepository},
    permissions::OwnershipGuard,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub films: Arc<FilmService>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> CatalogResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.catalog_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let attachments = Arc::new(DiskAttachmentBackend::new(
            config.storage.attachments.location.clone(),
            config.storage.attachments.tmp_location.clone(),
        ));
        let repository = Arc::new(SqliteFilmRepository::new(db.clone()));
        let films = Arc::new(FilmService::new(
            repository,
            attachments,
            Arc::new(OwnershipGuard),
        ));

        Ok(Self {
            config: Arc::new(config),
            db,
            films,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> CatalogResult<()> {
        let dirs = [
            &config.storage.data_directory,
            &config.storage.attachments.location,
            &config.storage.attachments.tmp_location,
        ];

        for dir in dirs {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                CatalogError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_prepares_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_data_directory(dir.path());

        let ctx = AppContext::new(config).await.unwrap();

        assert!(dir.path().join("attachments").is_dir());
        assert!(dir.path().join("tmp").is_dir());
        assert!(dir.path().join("catalog.sqlite").exists());
        assert_eq!(ctx.films.list(1, 15).await.unwrap().total_count, 0);
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_data_directory(dir.path());
        config.authentication.jwt_secret = "short".to_string();

        assert!(AppContext::new(config).await.is_err());
    }
}
