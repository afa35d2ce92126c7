pub mod auth;
pub mod health;
pub mod meetings;
pub mod transcripts;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api",
            auth::router()
                .merge(meetings::router())
                .merge(transcripts::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Auth
        auth::logout,
        // Meetings
        meetings::list_meetings,
        meetings::create_meeting,
        meetings::get_meeting,
        meetings::update_meeting,
        meetings::delete_meeting,
        // Transcripts
        transcripts::append_transcript,
        transcripts::update_transcript,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::meeting::Meeting,
            crate::models::meeting::MeetingDetail,
            crate::models::meeting::MeetingStatus,
            crate::models::meeting::MeetingSummary,
            crate::models::meeting::Participant,
            crate::models::meeting::Speaker,
            crate::models::meeting::SummaryDraft,
            crate::models::meeting::TodoItem,
            crate::models::meeting::TodoPriority,
            crate::models::transcript::TranscriptEntry,
            // Route request/response types
            health::HealthResponse,
            meetings::ListMeetingsResponse,
            meetings::Pagination,
            meetings::CreateMeetingRequest,
            meetings::UpdateMeetingRequest,
            transcripts::AppendTranscriptRequest,
            transcripts::UpdateTranscriptRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Session revocation"),
        (name = "Meetings", description = "Meeting management"),
        (name = "Transcripts", description = "Meeting transcripts"),
    )
)]
pub struct ApiDoc;
