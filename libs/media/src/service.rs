//! Request workflows composed over the tracker and the collaborators

use bytes::Bytes;
use lifecycle::{LifecycleError, VideoRecord, VideoStatus, VideoStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::analysis::AnalysisService;
use crate::edge::{CachePolicy, EdgeConfiguration, EdgeService};
use crate::error::VideoResult;
use crate::indexing::{Indexer, bounded};
use crate::models::{
    AnalyticsSummary, Deletion, IndexingAck, InsightsSummary, JobStatusReport, StreamingUrls,
    Transcript, UploadReceipt, VideoInsights, VideoList,
};
use crate::storage::ObjectStorage;
use crate::warehouse::Warehouse;

/// External collaborators handed to [`VideoService::new`]
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn ObjectStorage>,
    pub analysis: Arc<dyn AnalysisService>,
    pub warehouse: Arc<dyn Warehouse>,
    pub edge: EdgeService,
}

/// Which collaborators have enough configuration to be called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollaboratorFlags {
    pub storage: bool,
    pub analysis: bool,
    pub edge: bool,
    pub warehouse: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeOverview {
    pub configuration: EdgeConfiguration,
    pub cache_policy: CachePolicy,
}

#[derive(Clone)]
pub struct VideoService {
    store: Arc<dyn VideoStore>,
    storage: Arc<dyn ObjectStorage>,
    analysis: Arc<dyn AnalysisService>,
    warehouse: Arc<dyn Warehouse>,
    edge: EdgeService,
    indexer: Indexer,
    timeout: Duration,
    upload_timeout: Duration,
}

impl VideoService {
    pub fn new(store: Arc<dyn VideoStore>, collaborators: Collaborators, timeout: Duration) -> Self {
        let indexer = Indexer::new(
            store.clone(),
            collaborators.analysis.clone(),
            collaborators.warehouse.clone(),
            timeout,
        );

        Self {
            store,
            storage: collaborators.storage,
            analysis: collaborators.analysis,
            warehouse: collaborators.warehouse,
            edge: collaborators.edge,
            indexer,
            timeout,
            upload_timeout: timeout,
        }
    }

    /// Bound storage uploads separately from other collaborator calls
    pub fn with_upload_timeout(mut self, upload_timeout: Duration) -> Self {
        self.upload_timeout = upload_timeout;
        self
    }

    pub fn collaborator_flags(&self) -> CollaboratorFlags {
        CollaboratorFlags {
            storage: self.storage.is_configured(),
            analysis: self.analysis.is_configured(),
            edge: self.edge.is_configured(),
            warehouse: self.warehouse.is_configured(),
        }
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    /// Store a payload and start tracking it as `Uploaded`
    pub async fn upload(
        &self,
        data: impl Into<Bytes>,
        name: &str,
        content_type: &str,
    ) -> VideoResult<UploadReceipt> {
        let data = data.into();
        let size = data.len();
        let (id, location) = bounded(
            self.upload_timeout,
            "storage",
            self.storage.store(data, name, content_type),
        )
        .await?;

        let record = VideoRecord::uploaded(&id, name, &location, size, content_type);
        self.store.create(record.clone()).await?;

        if let Err(e) = bounded(
            self.timeout,
            "warehouse",
            self.warehouse.upsert_video_record(&record),
        )
        .await
        {
            warn!(video_id = %id, error = %e, "Failed to record upload in warehouse");
        }

        info!(video_id = %id, name = %name, size_bytes = size, "Video uploaded");
        Ok(UploadReceipt {
            location: self.edge.rewrite(&location),
            video_id: id,
            message: "Video uploaded successfully".to_string(),
        })
    }

    pub async fn list(&self) -> VideoResult<VideoList> {
        let videos = self.store.list().await?;
        Ok(VideoList {
            total: videos.len(),
            videos,
        })
    }

    pub async fn get(&self, id: &str) -> VideoResult<VideoRecord> {
        Ok(self.store.get(id).await?)
    }

    /// Start the background indexing task and acknowledge at once
    pub async fn trigger_indexing(&self, id: &str) -> VideoResult<IndexingAck> {
        let record = self.store.get(id).await?;
        self.indexer.spawn(
            record.id().to_string(),
            record.location().to_string(),
            record.name().to_string(),
        );

        Ok(IndexingAck {
            message: "Indexing started".to_string(),
            video_id: id.to_string(),
            status: VideoStatus::Indexing,
        })
    }

    pub async fn insights(&self, id: &str) -> VideoResult<VideoInsights> {
        self.store.get(id).await?;
        self.indexer.retrieve_insights(id).await
    }

    pub async fn transcript(&self, id: &str) -> VideoResult<Transcript> {
        let job = self.store.get_job(id).await?;
        let insights = bounded(self.timeout, "analysis", self.analysis.fetch_result(&job, id)).await?;
        Ok(Transcript {
            video_id: id.to_string(),
            transcript: insights.transcript,
            language: insights.language,
        })
    }

    pub async fn job_state(&self, id: &str) -> VideoResult<JobStatusReport> {
        let job = self.store.get_job(id).await?;
        let state = bounded(self.timeout, "analysis", self.analysis.status(&job)).await?;
        Ok(JobStatusReport {
            video_id: id.to_string(),
            job_ref: job,
            state,
        })
    }

    /// Remove a video from storage, analysis, the warehouse and the tracker
    pub async fn delete(&self, id: &str) -> VideoResult<Deletion> {
        let record = self.store.get(id).await?;

        let removed = bounded(
            self.timeout,
            "storage",
            self.storage.delete(record.id(), record.name()),
        )
        .await?;
        if !removed {
            warn!(video_id = %id, "Stored payload already gone");
        }

        match self.store.get_job(id).await {
            Ok(job) => {
                bounded(self.timeout, "analysis", self.analysis.delete(&job)).await?;
                self.store.unlink_job(id).await?;
            }
            Err(LifecycleError::JobNotLinked(_)) => {}
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = bounded(self.timeout, "warehouse", self.warehouse.delete_video(id)).await {
            warn!(video_id = %id, error = %e, "Failed to delete video from warehouse");
        }

        self.store.remove(id).await?;

        info!(video_id = %id, "Video deleted");
        Ok(Deletion {
            message: "Video deleted successfully".to_string(),
            video_id: id.to_string(),
        })
    }

    pub async fn streaming_urls(&self, id: &str) -> VideoResult<StreamingUrls> {
        let record = self.store.get(id).await?;

        Ok(match self.edge.build_streaming_url(record.id(), record.name()) {
            Ok(streaming_url) => StreamingUrls::Edge {
                video_id: id.to_string(),
                streaming_url,
                cdn_url: self.edge.rewrite(record.location()),
            },
            Err(_) => StreamingUrls::Direct {
                video_id: id.to_string(),
                location: record.location().to_string(),
                message: "Edge endpoint not configured, using storage location".to_string(),
            },
        })
    }

    pub async fn analytics(&self) -> VideoResult<AnalyticsSummary> {
        Ok(bounded(self.timeout, "warehouse", self.warehouse.aggregate()).await?)
    }

    pub async fn insights_summary(&self) -> VideoResult<InsightsSummary> {
        Ok(self.analytics().await?.into())
    }

    /// Create the warehouse tables
    pub async fn sync(&self) -> VideoResult<()> {
        bounded(self.timeout, "warehouse", self.warehouse.ensure_schema()).await?;
        info!("Warehouse schema synchronised");
        Ok(())
    }

    pub fn edge_overview(&self) -> EdgeOverview {
        EdgeOverview {
            configuration: self.edge.configuration(),
            cache_policy: self.edge.cache_policy(),
        }
    }
}
