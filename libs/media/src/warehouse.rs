//! Analytics warehouse collaborator backed by PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{CollaboratorError, CollaboratorResult};
use lifecycle::{VideoRecord, VideoStatus};
use sqlx::{PgPool, Row};
use tracing::info;

use crate::models::{AnalyticsSummary, KeywordCount, TopicCount, VideoInsights};

const SERVICE: &str = "warehouse";

/// Operations offered by the analytics warehouse
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Whether a database has been configured
    fn is_configured(&self) -> bool;

    /// Create the tables if they do not exist
    async fn ensure_schema(&self) -> CollaboratorResult<()>;

    async fn upsert_video_record(&self, record: &VideoRecord) -> CollaboratorResult<()>;

    /// Mirror a status change; an existing `indexed_at` is kept
    async fn update_status(
        &self,
        id: &str,
        status: VideoStatus,
        indexed_at: Option<DateTime<Utc>>,
    ) -> CollaboratorResult<()>;

    /// Append an insights snapshot with its keywords and topics
    async fn insert_insights(&self, insights: &VideoInsights) -> CollaboratorResult<()>;

    async fn aggregate(&self) -> CollaboratorResult<AnalyticsSummary>;

    /// Remove a video and everything derived from it
    async fn delete_video(&self, id: &str) -> CollaboratorResult<()>;
}

const SCHEMA: [&str; 7] = [
    r#"
    CREATE TABLE IF NOT EXISTS videos (
        video_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        location TEXT NOT NULL,
        status TEXT NOT NULL,
        uploaded_at TIMESTAMPTZ NOT NULL,
        indexed_at TIMESTAMPTZ,
        duration_seconds DOUBLE PRECISION,
        size_bytes BIGINT,
        content_type TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS video_insights (
        id BIGSERIAL PRIMARY KEY,
        video_id TEXT NOT NULL,
        transcript TEXT,
        language TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS video_keywords (
        id BIGSERIAL PRIMARY KEY,
        video_id TEXT NOT NULL,
        keyword TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS video_topics (
        id BIGSERIAL PRIMARY KEY,
        video_id TEXT NOT NULL,
        topic TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_video_insights_video_id ON video_insights (video_id)",
    "CREATE INDEX IF NOT EXISTS idx_video_keywords_video_id ON video_keywords (video_id)",
    "CREATE INDEX IF NOT EXISTS idx_video_topics_video_id ON video_topics (video_id)",
];

/// Warehouse over a lazily connected pool; without a pool every call fails
#[derive(Clone)]
pub struct PgWarehouse {
    pool: Option<PgPool>,
}

impl PgWarehouse {
    pub fn new(pool: Option<PgPool>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> CollaboratorResult<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| CollaboratorError::unavailable(SERVICE, "database URL not configured"))
    }
}

fn query_failed(err: sqlx::Error) -> CollaboratorError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            CollaboratorError::parse(SERVICE, err.to_string())
        }
        other => CollaboratorError::unavailable(SERVICE, other.to_string()),
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    fn is_configured(&self) -> bool {
        self.pool.is_some()
    }

    async fn ensure_schema(&self) -> CollaboratorResult<()> {
        let pool = self.pool()?;
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(query_failed)?;
        }

        info!("Warehouse tables initialised");
        Ok(())
    }

    async fn upsert_video_record(&self, record: &VideoRecord) -> CollaboratorResult<()> {
        sqlx::query(
            "INSERT INTO videos (video_id, name, location, status, uploaded_at, indexed_at, duration_seconds, size_bytes, content_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (video_id) DO UPDATE SET
             status = EXCLUDED.status,
             indexed_at = COALESCE(videos.indexed_at, EXCLUDED.indexed_at),
             duration_seconds = EXCLUDED.duration_seconds,
             size_bytes = EXCLUDED.size_bytes,
             content_type = EXCLUDED.content_type",
        )
        .bind(record.id())
        .bind(record.name())
        .bind(record.location())
        .bind(record.status().as_str())
        .bind(record.uploaded_at())
        .bind(record.indexed_at())
        .bind(record.duration_seconds())
        .bind(record.size_bytes().map(|size| size as i64))
        .bind(record.content_type())
        .execute(self.pool()?)
        .await
        .map_err(query_failed)?;

        info!(video_id = %record.id(), "Video mirrored to warehouse");
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: VideoStatus,
        indexed_at: Option<DateTime<Utc>>,
    ) -> CollaboratorResult<()> {
        sqlx::query(
            "UPDATE videos SET status = $1, indexed_at = COALESCE(indexed_at, $2) WHERE video_id = $3",
        )
        .bind(status.as_str())
        .bind(indexed_at)
        .bind(id)
        .execute(self.pool()?)
        .await
        .map_err(query_failed)?;

        info!(video_id = %id, status = %status, "Warehouse status updated");
        Ok(())
    }

    async fn insert_insights(&self, insights: &VideoInsights) -> CollaboratorResult<()> {
        let mut tx = self.pool()?.begin().await.map_err(query_failed)?;

        sqlx::query("INSERT INTO video_insights (video_id, transcript, language) VALUES ($1, $2, $3)")
            .bind(&insights.video_id)
            .bind(&insights.transcript)
            .bind(&insights.language)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;

        for keyword in &insights.keywords {
            sqlx::query("INSERT INTO video_keywords (video_id, keyword) VALUES ($1, $2)")
                .bind(&insights.video_id)
                .bind(keyword)
                .execute(&mut *tx)
                .await
                .map_err(query_failed)?;
        }

        for topic in &insights.topics {
            sqlx::query("INSERT INTO video_topics (video_id, topic) VALUES ($1, $2)")
                .bind(&insights.video_id)
                .bind(topic)
                .execute(&mut *tx)
                .await
                .map_err(query_failed)?;
        }

        if let Some(duration) = insights.duration_seconds {
            sqlx::query("UPDATE videos SET duration_seconds = $1 WHERE video_id = $2")
                .bind(duration)
                .bind(&insights.video_id)
                .execute(&mut *tx)
                .await
                .map_err(query_failed)?;
        }

        tx.commit().await.map_err(query_failed)?;

        info!(
            video_id = %insights.video_id,
            keywords_count = insights.keywords.len(),
            topics_count = insights.topics.len(),
            "Video insights inserted"
        );
        Ok(())
    }

    async fn aggregate(&self) -> CollaboratorResult<AnalyticsSummary> {
        let pool = self.pool()?;

        let row = sqlx::query(
            "SELECT COUNT(*) AS total_videos,
                    COALESCE(SUM(duration_seconds), 0) AS total_duration,
                    COUNT(*) FILTER (WHERE status = 'indexed') AS indexed_videos,
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed_videos
             FROM videos",
        )
        .fetch_one(pool)
        .await
        .map_err(query_failed)?;

        let top_keywords = sqlx::query(
            "SELECT keyword, COUNT(*) AS count FROM video_keywords
             GROUP BY keyword ORDER BY count DESC, keyword LIMIT 10",
        )
        .fetch_all(pool)
        .await
        .map_err(query_failed)?
        .into_iter()
        .map(|row| -> Result<KeywordCount, sqlx::Error> {
            Ok(KeywordCount {
                keyword: row.try_get("keyword")?,
                count: row.try_get("count")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(query_failed)?;

        let top_topics = sqlx::query(
            "SELECT topic, COUNT(*) AS count FROM video_topics
             GROUP BY topic ORDER BY count DESC, topic LIMIT 10",
        )
        .fetch_all(pool)
        .await
        .map_err(query_failed)?
        .into_iter()
        .map(|row| -> Result<TopicCount, sqlx::Error> {
            Ok(TopicCount {
                topic: row.try_get("topic")?,
                count: row.try_get("count")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(query_failed)?;

        let summary = AnalyticsSummary {
            total_videos: row.try_get("total_videos").map_err(query_failed)?,
            total_duration_seconds: row.try_get("total_duration").map_err(query_failed)?,
            indexed_videos: row.try_get("indexed_videos").map_err(query_failed)?,
            failed_videos: row.try_get("failed_videos").map_err(query_failed)?,
            top_keywords,
            top_topics,
        };

        info!(
            total_videos = summary.total_videos,
            indexed_videos = summary.indexed_videos,
            "Analytics retrieved"
        );
        Ok(summary)
    }

    async fn delete_video(&self, id: &str) -> CollaboratorResult<()> {
        let mut tx = self.pool()?.begin().await.map_err(query_failed)?;

        for statement in [
            "DELETE FROM video_keywords WHERE video_id = $1",
            "DELETE FROM video_topics WHERE video_id = $1",
            "DELETE FROM video_insights WHERE video_id = $1",
            "DELETE FROM videos WHERE video_id = $1",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(query_failed)?;
        }

        tx.commit().await.map_err(query_failed)?;

        info!(video_id = %id, "Video deleted from warehouse");
        Ok(())
    }
}
