use lifecycle::{JobRef, VideoRecord, VideoStatus};
use serde::{Deserialize, Serialize};

/// Insights extracted from a finished analysis job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInsights {
    pub video_id: String,
    pub transcript: Option<String>,
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
    pub faces: Vec<Face>,
    pub labels: Vec<String>,
    pub sentiments: Vec<Sentiment>,
    pub brands: Vec<String>,
    pub language: Option<String>,
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub id: Option<serde_json::Value>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub sentiment: Option<String>,
    pub score: Option<f64>,
}

/// Processing state reported by the analysis collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Uploaded,
    Processing,
    Processed,
    Failed,
    Unknown,
}

impl JobState {
    pub fn parse(state: &str) -> Self {
        match state {
            "Uploaded" => JobState::Uploaded,
            "Processing" => JobState::Processing,
            "Processed" => JobState::Processed,
            "Failed" => JobState::Failed,
            _ => JobState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: i64,
}

/// Aggregated figures read back from the warehouse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_videos: i64,
    pub total_duration_seconds: f64,
    pub indexed_videos: i64,
    pub failed_videos: i64,
    pub top_keywords: Vec<KeywordCount>,
    pub top_topics: Vec<TopicCount>,
}

/// Condensed view of [`AnalyticsSummary`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightsSummary {
    pub summary: SummaryFigures,
    pub top_keywords: Vec<KeywordCount>,
    pub top_topics: Vec<TopicCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryFigures {
    pub total_videos: i64,
    pub indexed_videos: i64,
    pub failed_videos: i64,
    pub total_duration_hours: f64,
    pub indexing_success_rate: f64,
}

impl From<AnalyticsSummary> for InsightsSummary {
    fn from(analytics: AnalyticsSummary) -> Self {
        let success_rate = if analytics.total_videos > 0 {
            round2(analytics.indexed_videos as f64 / analytics.total_videos as f64 * 100.0)
        } else {
            0.0
        };

        Self {
            summary: SummaryFigures {
                total_videos: analytics.total_videos,
                indexed_videos: analytics.indexed_videos,
                failed_videos: analytics.failed_videos,
                total_duration_hours: round2(analytics.total_duration_seconds / 3600.0),
                indexing_success_rate: success_rate,
            },
            top_keywords: analytics.top_keywords.into_iter().take(5).collect(),
            top_topics: analytics.top_topics.into_iter().take(5).collect(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Response for a stored upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub video_id: String,
    pub location: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoList {
    pub videos: Vec<VideoRecord>,
    pub total: usize,
}

/// Acknowledgement returned before the indexing task runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexingAck {
    pub message: String,
    pub video_id: String,
    pub status: VideoStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub video_id: String,
    pub transcript: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusReport {
    pub video_id: String,
    pub job_ref: JobRef,
    pub state: JobState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deletion {
    pub message: String,
    pub video_id: String,
}

/// Playback URLs, or the raw location when no edge is configured
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamingUrls {
    Edge {
        video_id: String,
        streaming_url: String,
        cdn_url: String,
    },
    Direct {
        video_id: String,
        location: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_parse() {
        assert_eq!(JobState::parse("Processed"), JobState::Processed);
        assert_eq!(JobState::parse("Processing"), JobState::Processing);
        assert_eq!(JobState::parse("Quarantined"), JobState::Unknown);
    }

    #[test]
    fn test_insights_summary_from_analytics() {
        let analytics = AnalyticsSummary {
            total_videos: 3,
            total_duration_seconds: 5400.0,
            indexed_videos: 2,
            failed_videos: 1,
            top_keywords: (0..8)
                .map(|i| KeywordCount {
                    keyword: format!("k{i}"),
                    count: 10 - i,
                })
                .collect(),
            top_topics: vec![],
        };

        let summary = InsightsSummary::from(analytics);
        assert_eq!(summary.summary.total_duration_hours, 1.5);
        assert_eq!(summary.summary.indexing_success_rate, 66.67);
        assert_eq!(summary.top_keywords.len(), 5);
        assert_eq!(summary.top_keywords[0].keyword, "k0");
    }

    #[test]
    fn test_success_rate_without_videos() {
        let summary = InsightsSummary::from(AnalyticsSummary::default());
        assert_eq!(summary.summary.indexing_success_rate, 0.0);
    }
}
