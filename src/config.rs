/// Configuration management for the films catalog
use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    pub upload_limit: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub catalog_db: PathBuf,
    pub attachments: AttachmentsConfig,
}

/// Poster attachment locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentsConfig {
    /// Directory served under `/attachments`
    pub location: PathBuf,
    /// Staging directory for in-flight uploads; must share a filesystem with `location`
    pub tmp_location: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Catalog behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub page_size: u32,
}

/// Fallback filter directives when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "films_catalog=debug,tower_http=debug";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> CatalogResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("CATALOG_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("CATALOG_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| CatalogError::validation("CATALOG_PORT", "Invalid port number"))?;
        let version = env!("CARGO_PKG_VERSION").to_string();
        let upload_limit = env::var("CATALOG_UPLOAD_LIMIT")
            .unwrap_or_else(|_| "5242880".to_string())
            .parse()
            .unwrap_or(5242880);

        let data_directory: PathBuf = env::var("CATALOG_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let catalog_db = env::var("CATALOG_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("catalog.sqlite"));
        let attachments = AttachmentsConfig {
            location: env::var("CATALOG_ATTACHMENTS_LOCATION")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_directory.join("attachments")),
            tmp_location: env::var("CATALOG_ATTACHMENTS_TMP_LOCATION")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_directory.join("tmp")),
        };

        let jwt_secret = env::var("CATALOG_JWT_SECRET")
            .map_err(|_| CatalogError::validation("CATALOG_JWT_SECRET", "JWT secret required"))?;

        let page_size = env::var("CATALOG_PAGE_SIZE")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);

        let log_level = env::var("CATALOG_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                catalog_db,
                attachments,
            },
            authentication: AuthConfig { jwt_secret },
            catalog: CatalogConfig { page_size },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> CatalogResult<()> {
        if self.service.hostname.is_empty() {
            return Err(CatalogError::validation(
                "CATALOG_HOSTNAME",
                "Hostname cannot be empty",
            ));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(CatalogError::validation(
                "CATALOG_JWT_SECRET",
                "JWT secret must be at least 32 characters",
            ));
        }

        if self.catalog.page_size == 0 {
            return Err(CatalogError::validation(
                "CATALOG_PAGE_SIZE",
                "Page size must be positive",
            ));
        }

        Ok(())
    }

    /// Configuration rooted in a single directory, used by tests
    #[cfg(test)]
    pub fn for_data_directory(data_directory: &std::path::Path) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                version: env!("CARGO_PKG_VERSION").to_string(),
                upload_limit: 1024 * 1024,
            },
            storage: StorageConfig {
                data_directory: data_directory.to_path_buf(),
                catalog_db: data_directory.join("catalog.sqlite"),
                attachments: AttachmentsConfig {
                    location: data_directory.join("attachments"),
                    tmp_location: data_directory.join("tmp"),
                },
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-that-is-at-least-32-characters".to_string(),
            },
            catalog: CatalogConfig { page_size: 15 },
            logging: LoggingConfig {
                level: DEFAULT_LOG_LEVEL.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_secret() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_data_directory(dir.path());
        assert!(config.validate().is_ok());

        config.authentication.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_data_directory(dir.path());
        config.catalog.page_size = 0;

        match config.validate() {
            Err(CatalogError::Validation { field, .. }) => assert_eq!(field, "CATALOG_PAGE_SIZE"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_default_log_level_is_a_valid_filter() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_data_directory(dir.path());

        assert!(tracing_subscriber::EnvFilter::try_new(&config.logging.level).is_ok());
    }
}
