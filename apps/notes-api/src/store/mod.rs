//! Entity store adapter: the narrow persistence interface the realtime and
//! HTTP layers depend on.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::meeting::{
    Meeting, MeetingStatus, MeetingSummary, Participant, Speaker, SummaryDraft,
};
use crate::models::transcript::{NewTranscript, TranscriptChanges, TranscriptEntry};

pub use memory::MemoryMeetingStore;
pub use postgres::PgMeetingStore;

/// Input for creating a meeting.
#[derive(Debug, Clone)]
pub struct CreateMeeting {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub audio_url: Option<String>,
    pub audio_size: Option<i64>,
    pub status: MeetingStatus,
    pub tags: Vec<String>,
    pub speakers: Vec<Speaker>,
    pub participants: Vec<Participant>,
}

/// Partial update of a meeting. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct MeetingChanges {
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

/// Filters for listing a user's meetings.
#[derive(Debug, Clone)]
pub struct MeetingQuery {
    pub user_id: i64,
    pub page: i64,
    pub limit: i64,
    pub status: Option<MeetingStatus>,
    pub search: Option<String>,
    pub tags: Vec<String>,
}

impl MeetingQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.limit
    }
}

#[derive(Debug, Clone)]
pub struct MeetingPage {
    pub meetings: Vec<Meeting>,
    pub total: i64,
}

#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn get_meeting(&self, id: i64) -> Result<Option<Meeting>, StoreError>;

    async fn append_transcript(&self, entry: NewTranscript) -> Result<TranscriptEntry, StoreError>;

    /// All transcript entries of a meeting, ascending by timestamp.
    async fn list_transcripts(&self, meeting_id: i64) -> Result<Vec<TranscriptEntry>, StoreError>;

    /// Replace the summary wholesale. Last write wins.
    async fn replace_summary(
        &self,
        meeting_id: i64,
        summary: &MeetingSummary,
    ) -> Result<(), StoreError>;

    async fn create_meeting(&self, meeting: CreateMeeting) -> Result<Meeting, StoreError>;

    /// Newest first.
    async fn list_meetings(&self, query: &MeetingQuery) -> Result<MeetingPage, StoreError>;

    async fn update_meeting(
        &self,
        id: i64,
        changes: MeetingChanges,
    ) -> Result<Option<Meeting>, StoreError>;

    /// Deletes the meeting and its transcript. Returns whether it existed.
    async fn delete_meeting(&self, id: i64) -> Result<bool, StoreError>;

    async fn update_transcript(
        &self,
        meeting_id: i64,
        transcript_id: i64,
        changes: TranscriptChanges,
    ) -> Result<Option<TranscriptEntry>, StoreError>;
}
