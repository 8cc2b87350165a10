//! In-memory collaborator stubs for tests

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::error::{CollaboratorError, CollaboratorResult};
use lifecycle::{JobRef, VideoRecord, VideoStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::analysis::AnalysisService;
use crate::models::{AnalyticsSummary, JobState, VideoInsights};
use crate::storage::ObjectStorage;
use crate::warehouse::Warehouse;

/// Object storage that keeps payloads in memory
#[derive(Default)]
pub struct StubStorage {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    failing: bool,
    delay: Option<Duration>,
}

impl StubStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose every call fails as unavailable
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Delay applied before every store
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn has_object(&self, id: &str, name: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&format!("{}/{}", id, name))
    }

    fn check(&self) -> CollaboratorResult<()> {
        if self.failing {
            return Err(CollaboratorError::unavailable("storage", "stub failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for StubStorage {
    fn is_configured(&self) -> bool {
        !self.failing
    }

    async fn store(
        &self,
        data: Bytes,
        name: &str,
        _content_type: &str,
    ) -> CollaboratorResult<(String, String)> {
        self.check()?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let id = Uuid::new_v4().to_string();
        let key = format!("{}/{}", id, name);
        self.objects.lock().unwrap().insert(key.clone(), data);
        Ok((id, format!("https://storage.test/videos/{}", key)))
    }

    async fn fetch_url(&self, id: &str, name: &str) -> CollaboratorResult<String> {
        self.check()?;
        Ok(format!("https://storage.test/videos/{}/{}", id, name))
    }

    async fn delete(&self, id: &str, name: &str) -> CollaboratorResult<bool> {
        self.check()?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .remove(&format!("{}/{}", id, name))
            .is_some())
    }

    async fn list(&self) -> CollaboratorResult<Vec<String>> {
        self.check()?;
        Ok(self.objects.lock().unwrap().keys().cloned().collect())
    }
}

/// Analysis collaborator with scripted replies
pub struct StubAnalysis {
    job: Option<JobRef>,
    insights: Option<VideoInsights>,
    state: JobState,
    delay: Option<Duration>,
    submissions: Mutex<Vec<String>>,
    deleted: Mutex<Vec<JobRef>>,
}

impl StubAnalysis {
    /// Accepts every submission with the given job reference
    pub fn returning(job: &str) -> Self {
        Self {
            job: Some(JobRef::from(job)),
            insights: Some(VideoInsights::default()),
            state: JobState::Processing,
            delay: None,
            submissions: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Rejects every submission
    pub fn failing_submit() -> Self {
        Self {
            job: None,
            ..Self::returning("unused")
        }
    }

    pub fn with_insights(mut self, insights: VideoInsights) -> Self {
        self.insights = Some(insights);
        self
    }

    /// Fails every result fetch
    pub fn failing_results(mut self) -> Self {
        self.insights = None;
        self
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = state;
        self
    }

    /// Delay applied before every submission
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Correlation ids of every submission seen
    pub fn submissions(&self) -> Vec<String> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<JobRef> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisService for StubAnalysis {
    fn is_configured(&self) -> bool {
        true
    }

    async fn authenticate(&self) -> CollaboratorResult<String> {
        Ok("stub-token".to_string())
    }

    async fn submit(
        &self,
        _location: &str,
        _name: &str,
        correlation_id: &str,
    ) -> CollaboratorResult<JobRef> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.submissions
            .lock()
            .unwrap()
            .push(correlation_id.to_string());
        self.job
            .clone()
            .ok_or_else(|| CollaboratorError::unavailable("analysis", "submission rejected"))
    }

    async fn fetch_result(&self, _job: &JobRef, video_id: &str) -> CollaboratorResult<VideoInsights> {
        let insights = self
            .insights
            .clone()
            .ok_or_else(|| CollaboratorError::unavailable("analysis", "results unavailable"))?;
        Ok(VideoInsights {
            video_id: video_id.to_string(),
            ..insights
        })
    }

    async fn status(&self, _job: &JobRef) -> CollaboratorResult<JobState> {
        Ok(self.state)
    }

    async fn delete(&self, job: &JobRef) -> CollaboratorResult<bool> {
        self.deleted.lock().unwrap().push(job.clone());
        Ok(true)
    }
}

/// Warehouse that records writes and serves a fixed summary
#[derive(Default)]
pub struct StubWarehouse {
    failing: bool,
    summary: AnalyticsSummary,
    records: Mutex<Vec<VideoRecord>>,
    statuses: Mutex<Vec<(String, VideoStatus)>>,
    insights: Mutex<Vec<VideoInsights>>,
    deleted: Mutex<Vec<String>>,
}

impl StubWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warehouse whose every call fails as unavailable
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_summary(mut self, summary: AnalyticsSummary) -> Self {
        self.summary = summary;
        self
    }

    /// Ids of every upserted record
    pub fn records(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect()
    }

    pub fn statuses(&self) -> Vec<(String, VideoStatus)> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn insight_count(&self) -> usize {
        self.insights.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn check(&self) -> CollaboratorResult<()> {
        if self.failing {
            return Err(CollaboratorError::unavailable("warehouse", "stub failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for StubWarehouse {
    fn is_configured(&self) -> bool {
        !self.failing
    }

    async fn ensure_schema(&self) -> CollaboratorResult<()> {
        self.check()
    }

    async fn upsert_video_record(&self, record: &VideoRecord) -> CollaboratorResult<()> {
        self.check()?;
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: VideoStatus,
        _indexed_at: Option<DateTime<Utc>>,
    ) -> CollaboratorResult<()> {
        self.check()?;
        self.statuses
            .lock()
            .unwrap()
            .push((id.to_string(), status));
        Ok(())
    }

    async fn insert_insights(&self, insights: &VideoInsights) -> CollaboratorResult<()> {
        self.check()?;
        self.insights.lock().unwrap().push(insights.clone());
        Ok(())
    }

    async fn aggregate(&self) -> CollaboratorResult<AnalyticsSummary> {
        self.check()?;
        Ok(self.summary.clone())
    }

    async fn delete_video(&self, id: &str) -> CollaboratorResult<()> {
        self.check()?;
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
