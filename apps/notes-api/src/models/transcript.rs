use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::transcripts;

/// One line of a meeting transcript.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = transcripts)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: i64,
    pub meeting_id: i64,
    pub text: String,
    pub timestamp: i64,
    pub speaker_id: Option<String>,
    pub speaker_name: Option<String>,
    pub is_highlighted: bool,
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = transcripts)]
pub struct NewTranscript {
    pub meeting_id: i64,
    pub text: String,
    pub timestamp: i64,
    pub speaker_id: Option<String>,
    pub speaker_name: Option<String>,
    pub is_highlighted: bool,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = transcripts)]
pub struct TranscriptChanges {
    pub text: Option<String>,
    pub timestamp: Option<i64>,
    pub speaker_id: Option<String>,
    pub speaker_name: Option<String>,
    pub is_highlighted: Option<bool>,
    pub confidence: Option<f64>,
}

impl TranscriptChanges {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.timestamp.is_none()
            && self.speaker_id.is_none()
            && self.speaker_name.is_none()
            && self.is_highlighted.is_none()
            && self.confidence.is_none()
    }
}
