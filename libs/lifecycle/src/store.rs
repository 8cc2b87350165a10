//! Lifecycle tracker: the only owner of video records and job links

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{LifecycleError, LifecycleResult};
use crate::models::{JobRef, VideoRecord, VideoStatus};

/// Storage abstraction for video records and their analysis job links
///
/// Implementations must apply each operation atomically with respect to the
/// others. Multi-step workflows built on top of the store are not atomic.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Insert a new record
    async fn create(&self, record: VideoRecord) -> LifecycleResult<()>;

    /// Fetch a record by id
    async fn get(&self, id: &str) -> LifecycleResult<VideoRecord>;

    /// All records in insertion order
    async fn list(&self) -> LifecycleResult<Vec<VideoRecord>>;

    /// Overwrite the status; `indexed_at` is set once, when moving to `Indexed`
    async fn set_status(
        &self,
        id: &str,
        status: VideoStatus,
        indexed_at: Option<DateTime<Utc>>,
    ) -> LifecycleResult<()>;

    /// Record the analysed duration of a video
    async fn set_duration(&self, id: &str, seconds: f64) -> LifecycleResult<()>;

    /// Delete a record and its job link
    async fn remove(&self, id: &str) -> LifecycleResult<()>;

    /// Associate an analysis job with a video; latest wins
    async fn link_job(&self, id: &str, job: JobRef) -> LifecycleResult<()>;

    /// Job linked to a video
    async fn get_job(&self, id: &str) -> LifecycleResult<JobRef>;

    /// Drop the job link, if any
    async fn unlink_job(&self, id: &str) -> LifecycleResult<()>;
}

#[derive(Debug, Default)]
struct Tables {
    videos: HashMap<String, VideoRecord>,
    order: Vec<String>,
    jobs: HashMap<String, JobRef>,
}

/// Process-local tracker
///
/// Both mappings sit behind one mutex. Cloning shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVideoStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn create(&self, record: VideoRecord) -> LifecycleResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.videos.contains_key(record.id()) {
            return Err(LifecycleError::DuplicateId(record.id().to_string()));
        }

        debug!(video_id = %record.id(), "Tracking new video");
        tables.order.push(record.id().to_string());
        tables.videos.insert(record.id().to_string(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> LifecycleResult<VideoRecord> {
        let tables = self.tables.lock().await;
        tables
            .videos
            .get(id)
            .cloned()
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    async fn list(&self) -> LifecycleResult<Vec<VideoRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .order
            .iter()
            .filter_map(|id| tables.videos.get(id).cloned())
            .collect())
    }

    async fn set_status(
        &self,
        id: &str,
        status: VideoStatus,
        indexed_at: Option<DateTime<Utc>>,
    ) -> LifecycleResult<()> {
        let mut tables = self.tables.lock().await;
        let record = tables
            .videos
            .get_mut(id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;

        debug!(video_id = %id, from = %record.status(), to = %status, "Status transition");
        record.apply_status(status, indexed_at);
        Ok(())
    }

    async fn set_duration(&self, id: &str, seconds: f64) -> LifecycleResult<()> {
        let mut tables = self.tables.lock().await;
        let record = tables
            .videos
            .get_mut(id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;
        record.apply_duration(seconds);
        Ok(())
    }

    async fn remove(&self, id: &str) -> LifecycleResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.videos.remove(id).is_none() {
            return Err(LifecycleError::NotFound(id.to_string()));
        }
        tables.order.retain(|existing| existing != id);
        tables.jobs.remove(id);
        Ok(())
    }

    async fn link_job(&self, id: &str, job: JobRef) -> LifecycleResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(previous) = tables.jobs.insert(id.to_string(), job) {
            debug!(video_id = %id, previous = %previous, "Replacing linked analysis job");
        }
        Ok(())
    }

    async fn get_job(&self, id: &str) -> LifecycleResult<JobRef> {
        let tables = self.tables.lock().await;
        tables
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| LifecycleError::JobNotLinked(id.to_string()))
    }

    async fn unlink_job(&self, id: &str) -> LifecycleResult<()> {
        self.tables.lock().await.jobs.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str) -> VideoRecord {
        VideoRecord::uploaded(id, format!("{id}.mp4"), format!("https://host/{id}"), 1000, "video/mp4")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryVideoStore::new();
        store.create(record("v1")).await.unwrap();

        let fetched = store.get("v1").await.unwrap();
        assert_eq!(fetched.status(), VideoStatus::Uploaded);
        assert_eq!(fetched.size_bytes(), Some(1000));
        assert!(fetched.indexed_at().is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = InMemoryVideoStore::new();
        assert_eq!(
            store.get("missing").await,
            Err(LifecycleError::NotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_duplicate_create() {
        let store = InMemoryVideoStore::new();
        store.create(record("v1")).await.unwrap();
        assert_eq!(
            store.create(record("v1")).await,
            Err(LifecycleError::DuplicateId("v1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let store = InMemoryVideoStore::new();
        for id in ["c", "a", "b"] {
            store.create(record(id)).await.unwrap();
        }
        store.remove("a").await.unwrap();
        store.create(record("a")).await.unwrap();

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_set_status_on_missing_id() {
        let store = InMemoryVideoStore::new();
        assert_eq!(
            store.set_status("ghost", VideoStatus::Indexing, None).await,
            Err(LifecycleError::NotFound("ghost".to_string()))
        );
    }

    #[tokio::test]
    async fn test_indexed_at_is_set_once() {
        let store = InMemoryVideoStore::new();
        store.create(record("v1")).await.unwrap();

        let first = Utc::now();
        store
            .set_status("v1", VideoStatus::Indexed, Some(first))
            .await
            .unwrap();
        store
            .set_status("v1", VideoStatus::Indexed, Some(first + Duration::minutes(1)))
            .await
            .unwrap();
        store.set_status("v1", VideoStatus::Indexing, None).await.unwrap();

        let fetched = store.get("v1").await.unwrap();
        assert_eq!(fetched.status(), VideoStatus::Indexing);
        assert_eq!(fetched.indexed_at(), Some(first));
    }

    #[tokio::test]
    async fn test_job_links() {
        let store = InMemoryVideoStore::new();
        store.create(record("v1")).await.unwrap();

        assert_eq!(
            store.get_job("v1").await,
            Err(LifecycleError::JobNotLinked("v1".to_string()))
        );

        store.link_job("v1", JobRef::from("J1")).await.unwrap();
        store.link_job("v1", JobRef::from("J2")).await.unwrap();
        assert_eq!(store.get_job("v1").await.unwrap(), JobRef::from("J2"));

        store.unlink_job("v1").await.unwrap();
        store.unlink_job("v1").await.unwrap();
        assert!(store.get_job("v1").await.is_err());
    }

    #[tokio::test]
    async fn test_job_not_linked_in_every_status() {
        let store = InMemoryVideoStore::new();
        store.create(record("v1")).await.unwrap();

        for status in [
            VideoStatus::Uploaded,
            VideoStatus::Indexing,
            VideoStatus::Indexed,
            VideoStatus::Failed,
        ] {
            let indexed_at = (status == VideoStatus::Indexed).then(Utc::now);
            store.set_status("v1", status, indexed_at).await.unwrap();
            assert_eq!(
                store.get_job("v1").await,
                Err(LifecycleError::JobNotLinked("v1".to_string())),
                "{status}"
            );
        }
    }

    #[tokio::test]
    async fn test_last_completed_status_wins() {
        let store = InMemoryVideoStore::new();
        store.create(record("v1")).await.unwrap();

        store.set_status("v1", VideoStatus::Failed, None).await.unwrap();
        store.set_status("v1", VideoStatus::Indexing, None).await.unwrap();
        assert_eq!(store.get("v1").await.unwrap().status(), VideoStatus::Indexing);

        store.set_status("v1", VideoStatus::Failed, None).await.unwrap();
        assert_eq!(store.get("v1").await.unwrap().status(), VideoStatus::Failed);
    }

    #[tokio::test]
    async fn test_remove_clears_job_link() {
        let store = InMemoryVideoStore::new();
        store.create(record("v1")).await.unwrap();
        store.link_job("v1", JobRef::from("J1")).await.unwrap();

        store.remove("v1").await.unwrap();

        assert!(matches!(store.get("v1").await, Err(LifecycleError::NotFound(_))));
        assert!(matches!(
            store.get_job("v1").await,
            Err(LifecycleError::JobNotLinked(_))
        ));
        assert!(matches!(store.remove("v1").await, Err(LifecycleError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_duration() {
        let store = InMemoryVideoStore::new();
        store.create(record("v1")).await.unwrap();
        store.set_duration("v1", 42.5).await.unwrap();
        assert_eq!(store.get("v1").await.unwrap().duration_seconds(), Some(42.5));
        assert!(store.set_duration("ghost", 1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_status_updates_stay_consistent() {
        let store = InMemoryVideoStore::new();
        store.create(record("v1")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            let status = if i % 2 == 0 {
                VideoStatus::Indexing
            } else {
                VideoStatus::Failed
            };
            handles.push(tokio::spawn(async move {
                store.set_status("v1", status, None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let fetched = store.get("v1").await.unwrap();
        assert!(matches!(
            fetched.status(),
            VideoStatus::Indexing | VideoStatus::Failed
        ));
        assert_eq!(fetched.id(), "v1");
        assert_eq!(fetched.size_bytes(), Some(1000));
        assert!(fetched.indexed_at().is_none());
    }
}
