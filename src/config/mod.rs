/// Configuration management for the Stateway service
///
/// Handles server binding, the definition database and repository behaviour.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Definition repository configuration
    pub repository: RepositoryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Definition store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx SQLite connection url (e.g., "sqlite://data/stateway.db?mode=rwc")
    pub url: String,
}

/// Repository behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Charset for decoding raw sources and for dedup byte comparison
    pub charset: String,
    /// Tenant used when a source specifies none
    pub default_tenant_id: String,
    /// Registered parser used for raw content ("json", "yaml")
    pub parser_name: String,
    /// Directory of definition files registered at start-up, if any
    pub definitions_dir: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            charset: "UTF-8".to_string(),
            default_tenant_id: "000001".to_string(),
            parser_name: crate::definition::parser::DEFAULT_PARSER.to_string(),
            definitions_dir: None,
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        let repository = RepositoryConfig::default();
        Self {
            server: ServerConfig {
                host: std::env::var("STATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("STATEWAY_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            database: DatabaseConfig {
                url: std::env::var("STATEWAY_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/stateway.db?mode=rwc".to_string()),
            },
            repository: RepositoryConfig {
                charset: std::env::var("STATEWAY_CHARSET").unwrap_or(repository.charset),
                default_tenant_id: std::env::var("STATEWAY_DEFAULT_TENANT")
                    .unwrap_or(repository.default_tenant_id),
                parser_name: std::env::var("STATEWAY_PARSER").unwrap_or(repository.parser_name),
                definitions_dir: std::env::var("STATEWAY_DEFINITIONS_DIR").ok(),
            },
        }
    }
}
