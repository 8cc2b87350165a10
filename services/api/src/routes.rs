//! API service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use lifecycle::VideoRecord;
use media::models::{
    AnalyticsSummary, Deletion, IndexingAck, InsightsSummary, JobStatusReport, StreamingUrls,
    Transcript, UploadReceipt, VideoInsights, VideoList,
};
use media::service::EdgeOverview;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::request_logging,
    validation::{resolve_content_type, validate_filename, validate_payload},
};

const UPLOAD_FIELD: &str = "file";

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let video_routes = Router::new()
        .route("/upload", post(upload_video))
        .route("/", get(list_videos))
        .route("/:id", get(get_video).delete(delete_video))
        .route("/:id/index", post(trigger_indexing))
        .route("/:id/insights", get(get_insights))
        .route("/:id/transcript", get(get_transcript))
        .route("/:id/indexing-status", get(get_indexing_status))
        .route("/:id/streaming-url", get(get_streaming_url));

    let analytics_routes = Router::new()
        .route("/videos", get(video_analytics))
        .route("/insights", get(insights_summary))
        .route("/sync", post(sync_warehouse))
        .route("/front-door", get(edge_overview));

    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .nest("/api/videos", video_routes)
        .nest("/api/analytics", analytics_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Service description and configured collaborators
pub async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "Video Insights Platform",
        "version": env!("CARGO_PKG_VERSION"),
        "services": state.video_service.collaborator_flags(),
    }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "services": state.video_service.collaborator_flags(),
    }))
}

/// Store an uploaded video from the multipart field `file`
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadReceipt>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_string();
        validate_filename(&name).map_err(ApiError::BadRequest)?;
        let content_type = resolve_content_type(field.content_type()).map_err(ApiError::BadRequest)?;

        let data = field.bytes().await?;
        validate_payload(&data).map_err(ApiError::BadRequest)?;

        let receipt = state
            .video_service
            .upload(data, &name, &content_type)
            .await?;
        return Ok(Json(receipt));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

pub async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<VideoList>> {
    Ok(Json(state.video_service.list().await?))
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VideoRecord>> {
    Ok(Json(state.video_service.get(&id).await?))
}

/// Start indexing in the background
pub async fn trigger_indexing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<IndexingAck>> {
    Ok(Json(state.video_service.trigger_indexing(&id).await?))
}

/// Fetch insights and mark the video indexed
pub async fn get_insights(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VideoInsights>> {
    Ok(Json(state.video_service.insights(&id).await?))
}

pub async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Transcript>> {
    Ok(Json(state.video_service.transcript(&id).await?))
}

pub async fn get_indexing_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusReport>> {
    Ok(Json(state.video_service.job_state(&id).await?))
}

pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Deletion>> {
    Ok(Json(state.video_service.delete(&id).await?))
}

pub async fn get_streaming_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StreamingUrls>> {
    Ok(Json(state.video_service.streaming_urls(&id).await?))
}

pub async fn video_analytics(State(state): State<AppState>) -> ApiResult<Json<AnalyticsSummary>> {
    Ok(Json(state.video_service.analytics().await?))
}

pub async fn insights_summary(State(state): State<AppState>) -> ApiResult<Json<InsightsSummary>> {
    Ok(Json(state.video_service.insights_summary().await?))
}

/// Create the warehouse tables
pub async fn sync_warehouse(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.video_service.sync().await?;
    Ok(Json(json!({
        "message": "Warehouse schema synchronised",
        "status": "success"
    })))
}

pub async fn edge_overview(State(state): State<AppState>) -> Json<EdgeOverview> {
    Json(state.video_service.edge_overview())
}
