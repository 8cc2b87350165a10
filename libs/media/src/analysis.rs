//! Video analysis collaborator backed by the Video Indexer REST API

use async_trait::async_trait;
use common::error::{CollaboratorError, CollaboratorResult};
use lifecycle::JobRef;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{Face, JobState, Sentiment, VideoInsights};

const SERVICE: &str = "analysis";
const DEFAULT_LANGUAGE: &str = "en-US";

/// Operations offered by the analysis collaborator
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Whether credentials are present
    fn is_configured(&self) -> bool;

    /// Obtain an access token
    async fn authenticate(&self) -> CollaboratorResult<String>;

    /// Submit a stored video for analysis, tagged with our video id
    async fn submit(
        &self,
        location: &str,
        name: &str,
        correlation_id: &str,
    ) -> CollaboratorResult<JobRef>;

    /// Current analysis results for a job
    async fn fetch_result(&self, job: &JobRef, video_id: &str) -> CollaboratorResult<VideoInsights>;

    /// Processing state of a job
    async fn status(&self, job: &JobRef) -> CollaboratorResult<JobState>;

    /// Delete a job and its artefacts, returning whether it was removed
    async fn delete(&self, job: &JobRef) -> CollaboratorResult<bool>;
}

/// Video Indexer account settings
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub subscription_key: String,
    pub location: String,
    pub api_url: String,
}

impl IndexerConfig {
    pub fn is_configured(&self) -> bool {
        !self.account_id.trim().is_empty() && !self.subscription_key.trim().is_empty()
    }
}

pub struct VideoIndexerClient {
    http: Client,
    config: IndexerConfig,
    access_token: RwLock<Option<String>>,
}

impl VideoIndexerClient {
    pub fn new(config: IndexerConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            access_token: RwLock::new(None),
        }
    }

    fn videos_url(&self) -> String {
        format!(
            "{}/{}/Accounts/{}/Videos",
            self.config.api_url.trim_end_matches('/'),
            self.config.location,
            self.config.account_id
        )
    }

    fn video_url(&self, job: &JobRef) -> String {
        format!("{}/{}", self.videos_url(), job)
    }

    async fn token(&self) -> CollaboratorResult<String> {
        if let Some(token) = self.access_token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.authenticate().await
    }

    /// Map transport and status failures, dropping the cached token on 401
    async fn check(&self, response: reqwest::Result<Response>) -> CollaboratorResult<Response> {
        let response = response.map_err(|e| CollaboratorError::unavailable(SERVICE, e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("Video Indexer rejected the access token, clearing cache");
            self.access_token.write().await.take();
        }
        Err(CollaboratorError::unavailable(
            SERVICE,
            format!("request failed with status {}", status),
        ))
    }

    async fn fetch_index(&self, job: &JobRef) -> CollaboratorResult<Value> {
        let token = self.token().await?;
        let response = self
            .http
            .get(format!("{}/Index", self.video_url(job)))
            .query(&[("accessToken", token.as_str())])
            .send()
            .await;

        self.check(response)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| CollaboratorError::parse(SERVICE, e.to_string()))
    }
}

#[async_trait]
impl AnalysisService for VideoIndexerClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn authenticate(&self) -> CollaboratorResult<String> {
        if !self.config.is_configured() {
            return Err(CollaboratorError::unavailable(
                SERVICE,
                "Video Indexer credentials not configured",
            ));
        }

        let url = format!(
            "{}/auth/{}/Accounts/{}/AccessToken",
            self.config.api_url.trim_end_matches('/'),
            self.config.location,
            self.config.account_id
        );

        let response = self
            .http
            .get(url)
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .query(&[("allowEdit", "true")])
            .send()
            .await;

        let token: String = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::parse(SERVICE, e.to_string()))?;

        debug!("Obtained Video Indexer access token");
        *self.access_token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn submit(
        &self,
        location: &str,
        name: &str,
        correlation_id: &str,
    ) -> CollaboratorResult<JobRef> {
        let token = self.token().await?;
        let response = self
            .http
            .post(self.videos_url())
            .query(&[
                ("accessToken", token.as_str()),
                ("name", name),
                ("videoUrl", location),
                ("externalId", correlation_id),
                ("privacy", "Private"),
            ])
            .send()
            .await;

        let body: Value = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::parse(SERVICE, e.to_string()))?;

        let job = parse_job_ref(&body)?;
        info!(video_id = %correlation_id, job_ref = %job, "Submitted video for analysis");
        Ok(job)
    }

    async fn fetch_result(&self, job: &JobRef, video_id: &str) -> CollaboratorResult<VideoInsights> {
        let index = self.fetch_index(job).await?;
        parse_insights(video_id, &index)
    }

    async fn status(&self, job: &JobRef) -> CollaboratorResult<JobState> {
        let index = self.fetch_index(job).await?;
        Ok(index
            .get("state")
            .and_then(Value::as_str)
            .map(JobState::parse)
            .unwrap_or(JobState::Unknown))
    }

    async fn delete(&self, job: &JobRef) -> CollaboratorResult<bool> {
        let token = self.token().await?;
        let response = self
            .http
            .delete(self.video_url(job))
            .query(&[("accessToken", token.as_str())])
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable(SERVICE, e.to_string()))?;

        Ok(response.status() == StatusCode::NO_CONTENT)
    }
}

fn parse_job_ref(body: &Value) -> CollaboratorResult<JobRef> {
    match body.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(JobRef::new(id.clone())),
        Some(Value::Number(id)) => Ok(JobRef::new(id.to_string())),
        _ => Err(CollaboratorError::parse(SERVICE, "upload response has no video id")),
    }
}

fn names(insights: &Value, key: &str) -> Vec<String> {
    items(insights, key)
        .iter()
        .map(|item| str_field(item, "name").unwrap_or_default())
        .collect()
}

fn items<'a>(insights: &'a Value, key: &str) -> &'a [Value] {
    insights
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Extract [`VideoInsights`] from a Video Indexer index document
pub fn parse_insights(video_id: &str, index: &Value) -> CollaboratorResult<VideoInsights> {
    if !index.is_object() {
        return Err(CollaboratorError::parse(SERVICE, "index document is not an object"));
    }

    let empty = Value::Null;
    let insights = index
        .get("videos")
        .and_then(Value::as_array)
        .and_then(|videos| videos.first())
        .and_then(|video| video.get("insights"))
        .unwrap_or(&empty);

    let transcript = items(insights, "transcript")
        .iter()
        .map(|line| str_field(line, "text").unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ");

    let faces = items(insights, "faces")
        .iter()
        .map(|face| Face {
            id: face.get("id").cloned(),
            name: str_field(face, "name"),
        })
        .collect();

    let sentiments = items(insights, "sentiments")
        .iter()
        .map(|sentiment| Sentiment {
            sentiment: str_field(sentiment, "sentimentType"),
            score: sentiment.get("averageScore").and_then(Value::as_f64),
        })
        .collect();

    let language = str_field(insights, "sourceLanguage").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    Ok(VideoInsights {
        video_id: video_id.to_string(),
        transcript: Some(transcript),
        keywords: names(insights, "keywords"),
        topics: names(insights, "topics"),
        faces,
        labels: names(insights, "labels"),
        sentiments,
        brands: names(insights, "brands"),
        language: Some(language),
        duration_seconds: index.get("durationInSeconds").and_then(Value::as_f64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode as AxumStatus,
        routing::{delete, get, post},
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn sample_index() -> Value {
        json!({
            "state": "Processed",
            "durationInSeconds": 120.5,
            "videos": [{
                "insights": {
                    "sourceLanguage": "fr-FR",
                    "transcript": [{"text": "hello"}, {"text": "world"}],
                    "keywords": [{"name": "rust"}, {"name": "video"}],
                    "topics": [{"name": "programming"}],
                    "faces": [{"id": 7, "name": "Ada"}],
                    "labels": [{"name": "laptop"}],
                    "sentiments": [{"sentimentType": "Positive", "averageScore": 0.9}],
                    "brands": [{"name": "Ferris"}]
                }
            }]
        })
    }

    #[test]
    fn test_parse_insights() {
        let insights = parse_insights("v1", &sample_index()).unwrap();
        assert_eq!(insights.video_id, "v1");
        assert_eq!(insights.transcript.as_deref(), Some("hello world"));
        assert_eq!(insights.keywords, vec!["rust", "video"]);
        assert_eq!(insights.topics, vec!["programming"]);
        assert_eq!(insights.faces[0].name.as_deref(), Some("Ada"));
        assert_eq!(insights.sentiments[0].score, Some(0.9));
        assert_eq!(insights.brands, vec!["Ferris"]);
        assert_eq!(insights.language.as_deref(), Some("fr-FR"));
        assert_eq!(insights.duration_seconds, Some(120.5));
    }

    #[test]
    fn test_parse_insights_defaults() {
        let insights = parse_insights("v1", &json!({})).unwrap();
        assert!(insights.keywords.is_empty());
        assert_eq!(insights.transcript.as_deref(), Some(""));
        assert_eq!(insights.language.as_deref(), Some(DEFAULT_LANGUAGE));
        assert!(insights.duration_seconds.is_none());
    }

    #[test]
    fn test_parse_insights_rejects_non_object() {
        let err = parse_insights("v1", &json!(["nope"])).unwrap_err();
        assert!(matches!(err, CollaboratorError::Parse { .. }));
    }

    #[test]
    fn test_parse_job_ref() {
        assert_eq!(parse_job_ref(&json!({"id": "abc"})).unwrap(), JobRef::from("abc"));
        assert!(parse_job_ref(&json!({"name": "clip"})).is_err());
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let client = VideoIndexerClient::new(IndexerConfig {
            account_id: String::new(),
            subscription_key: String::new(),
            location: "eastus".to_string(),
            api_url: "http://127.0.0.1:1".to_string(),
        });

        assert!(!client.is_configured());
        let err = client.submit("loc", "clip.mp4", "v1").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable { .. }));
    }

    async fn spawn_fake_indexer() -> String {
        let app = Router::new()
            .route(
                "/auth/:location/Accounts/:account/AccessToken",
                get(|| async { Json("token-123") }),
            )
            .route(
                "/:location/Accounts/:account/Videos",
                post(|Query(params): Query<HashMap<String, String>>| async move {
                    if params.get("accessToken").map(String::as_str) != Some("token-123") {
                        return Err(AxumStatus::UNAUTHORIZED);
                    }
                    let external = params.get("externalId").cloned().unwrap_or_default();
                    Ok(Json(json!({ "id": format!("job-{external}") })))
                }),
            )
            .route(
                "/:location/Accounts/:account/Videos/:job/Index",
                get(|| async { Json(sample_index()) }),
            )
            .route(
                "/:location/Accounts/:account/Videos/:job",
                delete(|Path((_, _, job)): Path<(String, String, String)>| async move {
                    if job == "job-v1" {
                        AxumStatus::NO_CONTENT
                    } else {
                        AxumStatus::NOT_FOUND
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_round_trip_against_fake_indexer() {
        let api_url = spawn_fake_indexer().await;
        let client = VideoIndexerClient::new(IndexerConfig {
            account_id: "acct".to_string(),
            subscription_key: "key".to_string(),
            location: "eastus".to_string(),
            api_url,
        });

        let job = client.submit("https://host/v1/clip.mp4", "clip.mp4", "v1").await.unwrap();
        assert_eq!(job, JobRef::from("job-v1"));

        let insights = client.fetch_result(&job, "v1").await.unwrap();
        assert_eq!(insights.keywords.len(), 2);
        assert_eq!(client.status(&job).await.unwrap(), JobState::Processed);

        assert!(client.delete(&job).await.unwrap());
        assert!(!client.delete(&JobRef::from("job-other")).await.unwrap());
    }
}
