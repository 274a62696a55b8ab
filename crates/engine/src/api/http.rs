//! HTTP routes - story creation and lookup for the session adapter.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use storyloom_domain::{CefrLevel, Story, StoryId};

use crate::app::App;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stories", post(create_story))
        .route("/api/stories/{id}", get(get_story))
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct CreateStoryRequest {
    title: String,
    genre: String,
    cefr_level: String,
    #[serde(default)]
    scene_text: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateStoryResponse {
    story_id: String,
}

async fn create_story(
    State(app): State<Arc<App>>,
    Json(request): Json<CreateStoryRequest>,
) -> Result<Json<CreateStoryResponse>, ApiError> {
    let cefr_level: CefrLevel = request
        .cefr_level
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown CEFR level: {}", request.cefr_level)))?;

    let mut story = Story::new(request.title, request.genre, cefr_level, app.clock.now());
    if let Some(scene_text) = request.scene_text {
        story = story.with_scene(scene_text);
    }
    if let Some(details) = request.details {
        story = story.with_details(details);
    }

    app.stories
        .save(&story)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(story_id = %story.id, genre = %story.genre, "Created story");
    Ok(Json(CreateStoryResponse {
        story_id: story.id.to_string(),
    }))
}

async fn get_story(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Story>, ApiError> {
    let story = app
        .stories
        .get(StoryId::from_uuid(id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(story))
}

#[derive(Debug)]
enum ApiError {
    NotFound,
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
