//! Service configuration loaded from the environment
//!
//! Nested keys use a double underscore separator, so `STORAGE__BUCKET`
//! populates `storage.bucket`. A `.env` file is read first when present.

use common::database::DatabaseConfig;
use config::{Config, ConfigError, Environment};
use media::analysis::IndexerConfig;
use media::edge::EdgeConfig;
use media::storage::StorageConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub edge: EdgeConfig,
    #[serde(default)]
    pub warehouse: DatabaseConfig,
    pub upload: UploadConfig,
    pub indexing: IndexingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted request body
    pub max_bytes: usize,
    /// Upper bound on storing one upload
    pub timeout_secs: u64,
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexingConfig {
    pub collaborator_timeout_secs: u64,
}

impl IndexingConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(Environment::default().separator("__"))
    }

    fn from_source(environment: Environment) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("storage.bucket", "videos")?
            .set_default("storage.region", "us-east-1")?
            .set_default("indexer.account_id", "")?
            .set_default("indexer.subscription_key", "")?
            .set_default("indexer.location", "eastus")?
            .set_default("indexer.api_url", "https://api.videoindexer.ai")?
            .set_default("warehouse.max_connections", 5)?
            .set_default("upload.max_bytes", 500 * 1024 * 1024)?
            .set_default("upload.timeout_secs", 600)?
            .set_default("indexing.collaborator_timeout_secs", 30)?
            .add_source(environment)
            .build()?;

        config.try_deserialize()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
