//! Transcript endpoints. Changes are pushed to the meeting's realtime room
//! the same way socket submissions are.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use notes_common::clock;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::transcript::{NewTranscript, TranscriptChanges, TranscriptEntry};
use crate::AppState;

use super::meetings::owned_meeting;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transcripts/{meeting_id}", post(append_transcript))
        .route(
            "/transcripts/{meeting_id}/{transcript_id}",
            put(update_transcript),
        )
}

async fn push_to_room(state: &AppState, meeting_id: i64) {
    if let Err(err) = state.realtime.publish_transcript(meeting_id).await {
        tracing::warn!(meeting_id, %err, "transcript saved but not broadcast");
    }
}

fn validate_confidence(confidence: Option<f64>, errors: &mut Vec<FieldError>) {
    if confidence.is_some_and(|c| !(0.0..=1.0).contains(&c)) {
        errors.push(FieldError {
            field: "confidence".to_string(),
            message: "Confidence must be between 0 and 1".to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// POST /api/transcripts/:meeting_id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppendTranscriptRequest {
    pub text: String,
    /// Unix seconds. Missing or zero means now.
    pub timestamp: Option<i64>,
    pub speaker_id: Option<String>,
    pub speaker_name: Option<String>,
    pub confidence: Option<f64>,
}

#[utoipa::path(
    post,
    path = "/api/transcripts/{meeting_id}",
    tag = "Transcripts",
    security(("bearer" = [])),
    params(("meeting_id" = i64, Path, description = "Meeting ID")),
    request_body = AppendTranscriptRequest,
    responses(
        (status = 201, description = "Entry appended", body = TranscriptEntry),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Meeting not found", body = ApiErrorBody),
    ),
)]
pub async fn append_transcript(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(meeting_id): Path<i64>,
    Json(body): Json<AppendTranscriptRequest>,
) -> Result<(StatusCode, Json<TranscriptEntry>), ApiError> {
    owned_meeting(&state, user_id, meeting_id).await?;

    let mut errors = Vec::new();
    if body.text.trim().is_empty() {
        errors.push(FieldError {
            field: "text".to_string(),
            message: "Text is required".to_string(),
        });
    }
    validate_confidence(body.confidence, &mut errors);
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let entry = state
        .store
        .append_transcript(NewTranscript {
            meeting_id,
            text: body.text,
            timestamp: clock::or_now(body.timestamp),
            speaker_id: body.speaker_id,
            speaker_name: body.speaker_name,
            is_highlighted: false,
            confidence: body.confidence,
        })
        .await?;

    push_to_room(&state, meeting_id).await;

    Ok((StatusCode::CREATED, Json(entry)))
}

// ---------------------------------------------------------------------------
// PUT /api/transcripts/:meeting_id/:transcript_id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTranscriptRequest {
    pub text: Option<String>,
    pub timestamp: Option<i64>,
    pub speaker_id: Option<String>,
    pub speaker_name: Option<String>,
    pub is_highlighted: Option<bool>,
    pub confidence: Option<f64>,
}

#[utoipa::path(
    put,
    path = "/api/transcripts/{meeting_id}/{transcript_id}",
    tag = "Transcripts",
    security(("bearer" = [])),
    params(
        ("meeting_id" = i64, Path, description = "Meeting ID"),
        ("transcript_id" = i64, Path, description = "Transcript entry ID"),
    ),
    request_body = UpdateTranscriptRequest,
    responses(
        (status = 200, description = "Entry updated", body = TranscriptEntry),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Meeting or entry not found", body = ApiErrorBody),
    ),
)]
pub async fn update_transcript(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((meeting_id, transcript_id)): Path<(i64, i64)>,
    Json(body): Json<UpdateTranscriptRequest>,
) -> Result<Json<TranscriptEntry>, ApiError> {
    owned_meeting(&state, user_id, meeting_id).await?;

    let mut errors = Vec::new();
    validate_confidence(body.confidence, &mut errors);
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let changes = TranscriptChanges {
        text: body.text,
        timestamp: body.timestamp,
        speaker_id: body.speaker_id,
        speaker_name: body.speaker_name,
        is_highlighted: body.is_highlighted,
        confidence: body.confidence,
    };
    let changed = !changes.is_empty();

    let entry = state
        .store
        .update_transcript(meeting_id, transcript_id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Transcript entry not found"))?;

    if changed {
        push_to_room(&state, meeting_id).await;
    }

    Ok(Json(entry))
}
