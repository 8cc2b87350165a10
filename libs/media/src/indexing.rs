//! Background indexing task and the insight retrieval transition
//!
//! Indexing runs detached from the request that triggered it. Its only
//! observable outcome is the tracker state: `Indexing` with a linked job on
//! success, `Failed` with no linked job otherwise. Warehouse propagation is
//! best-effort throughout.

use chrono::{DateTime, Utc};
use common::error::{CollaboratorError, CollaboratorResult};
use lifecycle::{JobRef, LifecycleError, VideoStatus, VideoStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::analysis::AnalysisService;
use crate::error::VideoResult;
use crate::models::VideoInsights;
use crate::warehouse::Warehouse;

/// Run a collaborator call with an upper bound on its duration
pub(crate) async fn bounded<T>(
    timeout: Duration,
    service: &'static str,
    call: impl Future<Output = CollaboratorResult<T>>,
) -> CollaboratorResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| CollaboratorError::unavailable(service, format!("timed out after {:?}", timeout)))?
}

/// How an indexing run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Submitted(JobRef),
    Failed,
}

#[derive(Clone)]
pub struct Indexer {
    store: Arc<dyn VideoStore>,
    analysis: Arc<dyn AnalysisService>,
    warehouse: Arc<dyn Warehouse>,
    timeout: Duration,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn VideoStore>,
        analysis: Arc<dyn AnalysisService>,
        warehouse: Arc<dyn Warehouse>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            analysis,
            warehouse,
            timeout,
        }
    }

    /// Start indexing without waiting for it
    ///
    /// The task handle is dropped; callers observe progress through the
    /// store only.
    pub fn spawn(&self, video_id: String, location: String, name: String) {
        let indexer = self.clone();
        tokio::spawn(async move {
            indexer.run(&video_id, &location, &name).await;
        });
    }

    /// Body of the background task
    pub async fn run(&self, video_id: &str, location: &str, name: &str) -> IndexOutcome {
        info!(video_id = %video_id, "Indexing started");

        match self.submit(video_id, location, name).await {
            Ok(job) => {
                self.propagate(video_id, VideoStatus::Indexing, None).await;
                info!(video_id = %video_id, job_ref = %job, "Indexing submitted");
                IndexOutcome::Submitted(job)
            }
            Err(e) => {
                warn!(video_id = %video_id, error = %e, "Indexing submission failed");
                self.mark_failed(video_id).await;
                IndexOutcome::Failed
            }
        }
    }

    async fn submit(&self, video_id: &str, location: &str, name: &str) -> VideoResult<JobRef> {
        let job = bounded(
            self.timeout,
            "analysis",
            self.analysis.submit(location, name, video_id),
        )
        .await?;

        self.store.link_job(video_id, job.clone()).await?;
        self.store
            .set_status(video_id, VideoStatus::Indexing, None)
            .await?;

        Ok(job)
    }

    async fn mark_failed(&self, video_id: &str) {
        if let Err(e) = self.store.unlink_job(video_id).await {
            error!(video_id = %video_id, error = %e, "Failed to unlink analysis job");
        }

        match self
            .store
            .set_status(video_id, VideoStatus::Failed, None)
            .await
        {
            Ok(()) => {}
            Err(LifecycleError::NotFound(_)) => {
                warn!(video_id = %video_id, "Video removed while indexing, dropping status update");
            }
            Err(e) => error!(video_id = %video_id, error = %e, "Failed to record indexing failure"),
        }

        self.propagate(video_id, VideoStatus::Failed, None).await;
    }

    /// Mirror a status change to the warehouse, logging any failure
    async fn propagate(&self, video_id: &str, status: VideoStatus, indexed_at: Option<DateTime<Utc>>) {
        if let Err(e) = bounded(
            self.timeout,
            "warehouse",
            self.warehouse.update_status(video_id, status, indexed_at),
        )
        .await
        {
            warn!(video_id = %video_id, status = %status, error = %e, "Warehouse status propagation failed");
        }
    }

    /// Fetch analysis results for a video and mark it `Indexed`
    ///
    /// Fails with `JobNotLinked` if indexing was never submitted. Analysis
    /// errors propagate and leave the status untouched. Every call re-fetches
    /// and re-persists insights; `indexed_at` keeps its first value.
    pub async fn retrieve_insights(&self, video_id: &str) -> VideoResult<VideoInsights> {
        let job = self.store.get_job(video_id).await?;

        let insights = bounded(
            self.timeout,
            "analysis",
            self.analysis.fetch_result(&job, video_id),
        )
        .await?;

        if let Err(e) = bounded(
            self.timeout,
            "warehouse",
            self.warehouse.insert_insights(&insights),
        )
        .await
        {
            warn!(video_id = %video_id, error = %e, "Failed to persist insights to warehouse");
        }

        if let Some(duration) = insights.duration_seconds {
            self.store.set_duration(video_id, duration).await?;
        }

        self.store
            .set_status(video_id, VideoStatus::Indexed, Some(Utc::now()))
            .await?;
        let indexed_at = self.store.get(video_id).await?.indexed_at();
        self.propagate(video_id, VideoStatus::Indexed, indexed_at).await;

        info!(
            video_id = %video_id,
            keywords_count = insights.keywords.len(),
            "Insights retrieved"
        );
        Ok(insights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VideoError;
    use crate::testing::{StubAnalysis, StubWarehouse};
    use lifecycle::{InMemoryVideoStore, VideoRecord};

    struct Fixture {
        store: Arc<InMemoryVideoStore>,
        warehouse: Arc<StubWarehouse>,
        indexer: Indexer,
    }

    async fn fixture(analysis: StubAnalysis, warehouse: StubWarehouse) -> Fixture {
        let store = Arc::new(InMemoryVideoStore::new());
        store
            .create(VideoRecord::uploaded("V1", "clip.mp4", "https://storage.test/V1/clip.mp4", 1000, "video/mp4"))
            .await
            .unwrap();
        let warehouse = Arc::new(warehouse);
        let indexer = Indexer::new(
            store.clone(),
            Arc::new(analysis),
            warehouse.clone(),
            Duration::from_millis(200),
        );
        Fixture {
            store,
            warehouse,
            indexer,
        }
    }

    fn insights() -> VideoInsights {
        VideoInsights {
            keywords: vec!["a".into(), "b".into()],
            topics: vec!["t".into()],
            language: Some("en-US".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_successful_submission_links_job() {
        let f = fixture(StubAnalysis::returning("J1"), StubWarehouse::new()).await;

        let outcome = f.indexer.run("V1", "https://storage.test/V1/clip.mp4", "clip.mp4").await;

        assert_eq!(outcome, IndexOutcome::Submitted(JobRef::from("J1")));
        assert_eq!(f.store.get("V1").await.unwrap().status(), VideoStatus::Indexing);
        assert_eq!(f.store.get_job("V1").await.unwrap(), JobRef::from("J1"));
        assert_eq!(f.warehouse.statuses(), vec![("V1".to_string(), VideoStatus::Indexing)]);
    }

    #[tokio::test]
    async fn test_rejected_submission_marks_failed() {
        let f = fixture(StubAnalysis::failing_submit(), StubWarehouse::new()).await;

        let outcome = f.indexer.run("V1", "loc", "clip.mp4").await;

        assert_eq!(outcome, IndexOutcome::Failed);
        assert_eq!(f.store.get("V1").await.unwrap().status(), VideoStatus::Failed);
        assert!(matches!(
            f.store.get_job("V1").await,
            Err(LifecycleError::JobNotLinked(_))
        ));
        assert_eq!(f.warehouse.statuses(), vec![("V1".to_string(), VideoStatus::Failed)]);
    }

    #[tokio::test]
    async fn test_warehouse_failure_does_not_roll_back() {
        let f = fixture(StubAnalysis::returning("J1"), StubWarehouse::failing()).await;

        let outcome = f.indexer.run("V1", "loc", "clip.mp4").await;

        assert_eq!(outcome, IndexOutcome::Submitted(JobRef::from("J1")));
        assert_eq!(f.store.get("V1").await.unwrap().status(), VideoStatus::Indexing);
    }

    #[tokio::test]
    async fn test_slow_analysis_times_out_to_failed() {
        let analysis = StubAnalysis::returning("J1").with_delay(Duration::from_secs(5));
        let f = fixture(analysis, StubWarehouse::new()).await;

        let outcome = f.indexer.run("V1", "loc", "clip.mp4").await;

        assert_eq!(outcome, IndexOutcome::Failed);
        assert_eq!(f.store.get("V1").await.unwrap().status(), VideoStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_video_fails_without_dangling_job() {
        let f = fixture(StubAnalysis::returning("J9"), StubWarehouse::new()).await;

        let outcome = f.indexer.run("ghost", "loc", "clip.mp4").await;

        assert_eq!(outcome, IndexOutcome::Failed);
        assert!(f.store.get_job("ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_spawned_task_updates_store() {
        let f = fixture(StubAnalysis::returning("J1"), StubWarehouse::new()).await;

        f.indexer.spawn("V1".into(), "loc".into(), "clip.mp4".into());

        for _ in 0..50 {
            if f.store.get("V1").await.unwrap().status() == VideoStatus::Indexing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(f.store.get("V1").await.unwrap().status(), VideoStatus::Indexing);
        assert_eq!(f.store.get_job("V1").await.unwrap(), JobRef::from("J1"));
    }

    #[tokio::test]
    async fn test_retrieve_insights_marks_indexed_once() {
        let analysis = StubAnalysis::returning("J1").with_insights(VideoInsights {
            duration_seconds: Some(90.0),
            ..insights()
        });
        let f = fixture(analysis, StubWarehouse::new()).await;
        f.indexer.run("V1", "loc", "clip.mp4").await;

        let first = f.indexer.retrieve_insights("V1").await.unwrap();
        assert_eq!(first.keywords.len(), 2);
        assert_eq!(first.video_id, "V1");

        let record = f.store.get("V1").await.unwrap();
        assert_eq!(record.status(), VideoStatus::Indexed);
        assert_eq!(record.duration_seconds(), Some(90.0));
        let indexed_at = record.indexed_at().expect("indexed_at set");

        tokio::time::sleep(Duration::from_millis(5)).await;
        f.indexer.retrieve_insights("V1").await.unwrap();
        assert_eq!(f.store.get("V1").await.unwrap().indexed_at(), Some(indexed_at));
        assert_eq!(f.warehouse.insight_count(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_insights_without_job() {
        let f = fixture(StubAnalysis::returning("J1"), StubWarehouse::new()).await;
        f.store.set_status("V1", VideoStatus::Failed, None).await.unwrap();

        assert_eq!(
            f.indexer.retrieve_insights("V1").await,
            Err(VideoError::Lifecycle(LifecycleError::JobNotLinked("V1".into())))
        );
    }

    #[tokio::test]
    async fn test_retrieve_insights_error_keeps_status() {
        let analysis = StubAnalysis::returning("J1").failing_results();
        let f = fixture(analysis, StubWarehouse::new()).await;
        f.indexer.run("V1", "loc", "clip.mp4").await;

        let err = f.indexer.retrieve_insights("V1").await.unwrap_err();
        assert!(matches!(err, VideoError::Collaborator(_)));

        let record = f.store.get("V1").await.unwrap();
        assert_eq!(record.status(), VideoStatus::Indexing);
        assert!(record.indexed_at().is_none());
    }

    #[tokio::test]
    async fn test_retrigger_after_indexed_keeps_indexed_at() {
        let f = fixture(StubAnalysis::returning("J1").with_insights(insights()), StubWarehouse::new()).await;
        f.indexer.run("V1", "loc", "clip.mp4").await;
        f.indexer.retrieve_insights("V1").await.unwrap();
        let indexed_at = f.store.get("V1").await.unwrap().indexed_at();

        f.indexer.run("V1", "loc", "clip.mp4").await;

        let record = f.store.get("V1").await.unwrap();
        assert_eq!(record.status(), VideoStatus::Indexing);
        assert_eq!(record.indexed_at(), indexed_at);
    }
}
