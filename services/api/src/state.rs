//! Application state shared across handlers

use anyhow::Result;
use common::database::{health_check, init_pool};
use lifecycle::InMemoryVideoStore;
use media::{
    VideoService,
    analysis::VideoIndexerClient,
    edge::EdgeService,
    service::Collaborators,
    storage::S3Storage,
    warehouse::{PgWarehouse, Warehouse},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub video_service: VideoService,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(video_service: VideoService, max_upload_bytes: usize) -> Self {
        Self {
            video_service,
            max_upload_bytes,
        }
    }

    /// Build every collaborator from configuration
    ///
    /// Missing credentials leave a collaborator unconfigured rather than
    /// failing startup; calls to it then fail per request.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let storage = S3Storage::new(&config.storage).await;
        if let Err(e) = storage.ensure_bucket().await {
            warn!(error = %e, "Could not ensure storage bucket exists");
        }

        let pool = init_pool(&config.warehouse)?;
        if let Some(pool) = &pool {
            match health_check(pool).await {
                Ok(_) => info!("Warehouse connection successful"),
                Err(e) => warn!(error = %e, "Warehouse unreachable, analytics will be unavailable"),
            }
        }
        let warehouse = PgWarehouse::new(pool);
        if warehouse.is_configured() {
            if let Err(e) = warehouse.ensure_schema().await {
                warn!(error = %e, "Could not initialise warehouse schema");
            }
        }

        let analysis = VideoIndexerClient::new(config.indexer.clone());
        if !config.indexer.is_configured() {
            warn!("Video Indexer credentials not configured");
        }

        let edge = EdgeService::new(&config.edge);

        let video_service = VideoService::new(
            Arc::new(InMemoryVideoStore::new()),
            Collaborators {
                storage: Arc::new(storage),
                analysis: Arc::new(analysis),
                warehouse: Arc::new(warehouse),
                edge,
            },
            config.indexing.collaborator_timeout(),
        )
        .with_upload_timeout(config.upload.timeout());

        info!(flags = ?video_service.collaborator_flags(), "Video service initialised");

        Ok(Self::new(video_service, config.upload.max_bytes))
    }
}
