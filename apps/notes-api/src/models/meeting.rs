use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::meetings;
use crate::error::StoreError;
use crate::models::transcript::TranscriptEntry;

/// Lifecycle of a meeting recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Recording,
    #[default]
    Completed,
    Archived,
}

impl MeetingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recording => "recording",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TodoPriority>,
}

/// Summary content as submitted by a client. Any `lastUpdated` sent along is
/// ignored; the server stamps its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDraft {
    pub keywords: Vec<String>,
    pub summary: String,
    pub todos: Vec<TodoItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Vec<String>>,
}

/// The persisted summary of a meeting. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSummary {
    #[serde(flatten)]
    pub content: SummaryDraft,
    pub last_updated: DateTime<Utc>,
}

impl SummaryDraft {
    pub fn stamp(self, accepted_at: DateTime<Utc>) -> MeetingSummary {
        MeetingSummary {
            content: self,
            last_updated: accepted_at,
        }
    }
}

/// Someone heard in the recording, as labelled by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Speaker {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A meeting as seen by the rest of the application.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub audio_url: Option<String>,
    pub audio_size: Option<i64>,
    pub status: MeetingStatus,
    pub summary: Option<MeetingSummary>,
    pub tags: Vec<String>,
    pub speakers: Vec<Speaker>,
    pub participants: Vec<Participant>,
    pub is_archived: bool,
    pub is_shared: bool,
    pub share_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// A meeting together with its ordered transcript.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetail {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub transcript: Vec<TranscriptEntry>,
}

// ---------------------------------------------------------------------------
// Diesel rows
// ---------------------------------------------------------------------------

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = meetings)]
pub struct MeetingRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub audio_url: Option<String>,
    pub audio_size: Option<i64>,
    pub status: String,
    pub summary: Option<serde_json::Value>,
    pub tags: serde_json::Value,
    pub speakers: serde_json::Value,
    pub participants: serde_json::Value,
    pub is_archived: bool,
    pub is_shared: bool,
    pub share_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MeetingRow> for Meeting {
    type Error = StoreError;

    fn try_from(row: MeetingRow) -> Result<Self, Self::Error> {
        let status: MeetingStatus = serde_json::from_value(serde_json::Value::String(row.status))?;
        let summary = row.summary.map(serde_json::from_value).transpose()?;
        let tags = json_list(row.tags)?;
        let speakers = json_list(row.speakers)?;
        let participants = json_list(row.participants)?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            duration: row.duration,
            start_time: row.start_time,
            end_time: row.end_time,
            audio_url: row.audio_url,
            audio_size: row.audio_size,
            status,
            summary,
            tags,
            speakers,
            participants,
            is_archived: row.is_archived,
            is_shared: row.is_shared,
            share_token: row.share_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// JSONB list columns; SQL null reads as empty.
fn json_list<T: DeserializeOwned>(value: serde_json::Value) -> Result<Vec<T>, StoreError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Insertable)]
#[diesel(table_name = meetings)]
pub struct NewMeetingRow<'a> {
    pub user_id: i64,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub duration: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub audio_url: Option<&'a str>,
    pub audio_size: Option<i64>,
    pub status: &'a str,
    pub tags: serde_json::Value,
    pub speakers: serde_json::Value,
    pub participants: serde_json::Value,
    pub is_archived: bool,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = meetings)]
pub struct MeetingChangeset {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub end_time: Option<DateTime<Utc>>,
    pub audio_url: Option<String>,
    pub audio_size: Option<i64>,
    pub status: Option<String>,
    pub summary: Option<serde_json::Value>,
    pub tags: Option<serde_json::Value>,
    pub speakers: Option<serde_json::Value>,
    pub participants: Option<serde_json::Value>,
    pub is_archived: Option<bool>,
    pub is_shared: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_flat_with_last_updated() {
        let draft: SummaryDraft = serde_json::from_value(serde_json::json!({
            "keywords": ["x"],
            "summary": "s",
            "todos": [],
            "lastUpdated": "1999-01-01T00:00:00Z"
        }))
        .unwrap();
        let at = Utc::now();
        let value = serde_json::to_value(draft.stamp(at)).unwrap();

        assert_eq!(value["keywords"], serde_json::json!(["x"]));
        assert_eq!(value["summary"], "s");
        assert!(value.get("actionItems").is_none());
        let stamped: DateTime<Utc> = serde_json::from_value(value["lastUpdated"].clone()).unwrap();
        assert_eq!(stamped, at);
    }

    #[test]
    fn summary_requires_core_fields() {
        let result: Result<SummaryDraft, _> =
            serde_json::from_value(serde_json::json!({ "summary": "only text" }));
        assert!(result.is_err());
    }

    #[test]
    fn row_with_unknown_status_is_corrupt() {
        let now = Utc::now();
        let row = MeetingRow {
            id: 1,
            user_id: 1,
            title: "t".into(),
            description: None,
            duration: 0,
            start_time: now,
            end_time: None,
            audio_url: None,
            audio_size: None,
            status: "exploded".into(),
            summary: None,
            tags: serde_json::json!([]),
            speakers: serde_json::Value::Null,
            participants: serde_json::json!([]),
            is_archived: false,
            is_shared: false,
            share_token: None,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(Meeting::try_from(row), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn row_decodes_speakers_and_participants() {
        let now = Utc::now();
        let row = MeetingRow {
            id: 7,
            user_id: 1,
            title: "t".into(),
            description: None,
            duration: 0,
            start_time: now,
            end_time: None,
            audio_url: None,
            audio_size: None,
            status: "completed".into(),
            summary: None,
            tags: serde_json::Value::Null,
            speakers: serde_json::json!([{ "id": "s1", "name": "Ana", "color": "#f00" }]),
            participants: serde_json::json!([{ "userId": "u9", "name": "Bo", "role": "host" }]),
            is_archived: false,
            is_shared: false,
            share_token: None,
            created_at: now,
            updated_at: now,
        };

        let meeting = Meeting::try_from(row).unwrap();
        assert!(meeting.tags.is_empty());
        assert_eq!(meeting.speakers[0].name, "Ana");
        assert_eq!(meeting.speakers[0].avatar, None);
        assert_eq!(meeting.participants[0].user_id, "u9");
        assert_eq!(meeting.participants[0].role.as_deref(), Some("host"));
    }
}
