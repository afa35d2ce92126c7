//! Meeting CRUD endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::meeting::{
    Meeting, MeetingDetail, MeetingStatus, Participant, Speaker, SummaryDraft,
};
use crate::store::{CreateMeeting, MeetingChanges, MeetingQuery};
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_TITLE_LEN: usize = 255;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meetings", get(list_meetings).post(create_meeting))
        .route(
            "/meetings/{id}",
            get(get_meeting).put(update_meeting).delete(delete_meeting),
        )
}

/// Load a meeting the caller owns. Meetings owned by someone else are
/// reported as missing.
pub(crate) async fn owned_meeting(
    state: &AppState,
    user_id: i64,
    meeting_id: i64,
) -> Result<Meeting, ApiError> {
    state
        .store
        .get_meeting(meeting_id)
        .await?
        .filter(|m| m.is_owned_by(user_id))
        .ok_or_else(|| ApiError::not_found("Meeting not found"))
}

fn validate_title(title: &str, errors: &mut Vec<FieldError>) {
    if title.is_empty() {
        errors.push(FieldError {
            field: "title".to_string(),
            message: "Title is required".to_string(),
        });
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push(FieldError {
            field: "title".to_string(),
            message: format!("Title must be {MAX_TITLE_LEN} characters or fewer"),
        });
    }
}

// ---------------------------------------------------------------------------
// GET /api/meetings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListMeetingsParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<MeetingStatus>,
    /// Comma-separated; a meeting matches if it carries any of them.
    pub tags: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListMeetingsResponse {
    pub meetings: Vec<Meeting>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "/api/meetings",
    tag = "Meetings",
    security(("bearer" = [])),
    params(
        ("page" = Option<i64>, Query, description = "Page number, starting at 1"),
        ("limit" = Option<i64>, Query, description = "Page size (1-100, default 20)"),
        ("search" = Option<String>, Query, description = "Match against title or description"),
        ("status" = Option<MeetingStatus>, Query, description = "Filter by status"),
        ("tags" = Option<String>, Query, description = "Comma-separated tags"),
    ),
    responses(
        (status = 200, description = "The caller's meetings, newest first", body = ListMeetingsResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_meetings(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListMeetingsParams>,
) -> Result<Json<ListMeetingsResponse>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let tags = params
        .tags
        .as_deref()
        .map(|t| {
            t.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let result = state
        .store
        .list_meetings(&MeetingQuery {
            user_id,
            page,
            limit,
            status: params.status,
            search: params.search,
            tags,
        })
        .await?;

    let pages = (result.total + limit - 1) / limit;

    Ok(Json(ListMeetingsResponse {
        meetings: result.meetings,
        pagination: Pagination {
            page,
            limit,
            total: result.total,
            pages,
        },
    }))
}

// ---------------------------------------------------------------------------
// POST /api/meetings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    pub title: String,
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub audio_url: Option<String>,
    pub audio_size: Option<i64>,
    pub status: Option<MeetingStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub speakers: Vec<Speaker>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

#[utoipa::path(
    post,
    path = "/api/meetings",
    tag = "Meetings",
    security(("bearer" = [])),
    request_body = CreateMeetingRequest,
    responses(
        (status = 201, description = "Meeting created", body = Meeting),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn create_meeting(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateMeetingRequest>,
) -> Result<(StatusCode, Json<Meeting>), ApiError> {
    let title = body.title.trim().to_string();
    let mut errors = Vec::new();
    validate_title(&title, &mut errors);
    if body.duration.is_some_and(|d| d < 0) {
        errors.push(FieldError {
            field: "duration".to_string(),
            message: "Duration must not be negative".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let meeting = state
        .store
        .create_meeting(CreateMeeting {
            user_id,
            title,
            description: body.description,
            duration: body.duration.unwrap_or(0),
            start_time: body.start_time.unwrap_or_else(Utc::now),
            end_time: body.end_time,
            audio_url: body.audio_url,
            audio_size: body.audio_size,
            status: body.status.unwrap_or_default(),
            tags: body.tags,
            speakers: body.speakers,
            participants: body.participants,
        })
        .await?;

    tracing::info!(user_id, meeting_id = meeting.id, "meeting created");

    Ok((StatusCode::CREATED, Json(meeting)))
}

// ---------------------------------------------------------------------------
// GET /api/meetings/:id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/meetings/{id}",
    tag = "Meetings",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Meeting ID")),
    responses(
        (status = 200, description = "Meeting with its transcript", body = MeetingDetail),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Meeting not found", body = ApiErrorBody),
    ),
)]
pub async fn get_meeting(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MeetingDetail>, ApiError> {
    let meeting = owned_meeting(&state, user_id, id).await?;
    let transcript = state.store.list_transcripts(id).await?;

    Ok(Json(MeetingDetail {
        meeting,
        transcript,
    }))
}

// ---------------------------------------------------------------------------
// PUT /api/meetings/:id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeetingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub end_time: Option<DateTime<Utc>>,
    pub audio_url: Option<String>,
    pub audio_size: Option<i64>,
    pub status: Option<MeetingStatus>,
    pub summary: Option<SummaryDraft>,
    pub tags: Option<Vec<String>>,
    pub speakers: Option<Vec<Speaker>>,
    pub participants: Option<Vec<Participant>>,
    pub is_archived: Option<bool>,
    pub is_shared: Option<bool>,
}

#[utoipa::path(
    put,
    path = "/api/meetings/{id}",
    tag = "Meetings",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Meeting ID")),
    request_body = UpdateMeetingRequest,
    responses(
        (status = 200, description = "Meeting updated", body = Meeting),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Meeting not found", body = ApiErrorBody),
    ),
)]
pub async fn update_meeting(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateMeetingRequest>,
) -> Result<Json<Meeting>, ApiError> {
    owned_meeting(&state, user_id, id).await?;

    let title = body.title.map(|t| t.trim().to_string());
    if let Some(title) = &title {
        let mut errors = Vec::new();
        validate_title(title, &mut errors);
        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }
    }

    let summary_changed = body.summary.is_some();
    let updated = state
        .store
        .update_meeting(
            id,
            MeetingChanges {
                title,
                description: body.description,
                duration: body.duration,
                end_time: body.end_time,
                audio_url: body.audio_url,
                audio_size: body.audio_size,
                status: body.status,
                summary: body.summary,
                tags: body.tags,
                speakers: body.speakers,
                participants: body.participants,
                is_archived: body.is_archived,
                is_shared: body.is_shared,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    if summary_changed {
        state
            .realtime
            .publish_summary(id, updated.summary.as_ref());
    }

    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// DELETE /api/meetings/:id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/meetings/{id}",
    tag = "Meetings",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Meeting ID")),
    responses(
        (status = 204, description = "Meeting and transcript deleted"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Meeting not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_meeting(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    owned_meeting(&state, user_id, id).await?;

    if !state.store.delete_meeting(id).await? {
        return Err(ApiError::not_found("Meeting not found"));
    }

    tracing::info!(user_id, meeting_id = id, "meeting deleted");
    Ok(StatusCode::NO_CONTENT)
}
