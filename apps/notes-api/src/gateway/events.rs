//! Realtime event names, wire-format frames, and typed payloads.
//!
//! Every frame in either direction is a JSON text message of the form
//! `{"t": "<event name>", "d": <payload>}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;
use crate::models::id::FlexibleId;
use crate::models::meeting::{MeetingSummary, SummaryDraft};
use crate::models::transcript::TranscriptEntry;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub struct EventName;

impl EventName {
    // Client -> server
    pub const JOIN_MEETING: &'static str = "join-meeting";
    pub const LEAVE_MEETING: &'static str = "leave-meeting";
    pub const TRANSCRIPT: &'static str = "transcript";
    pub const SUMMARY: &'static str = "summary";

    // Server -> client
    pub const JOINED_MEETING: &'static str = "joined-meeting";
    pub const ERROR: &'static str = "error";
    pub const TRANSCRIPT_UPDATE: &'static str = "transcript-update";
    pub const SUMMARY_UPDATE: &'static str = "summary-update";
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// A message sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub t: String,
    pub d: Value,
}

impl ServerMessage {
    fn new(event_name: &str, payload: impl Serialize) -> Self {
        let d = match serde_json::to_value(payload) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(?e, event = event_name, "failed to encode event payload");
                Value::Null
            }
        };
        Self {
            t: event_name.to_string(),
            d,
        }
    }

    pub fn joined_meeting(meeting_id: i64) -> Self {
        Self::new(EventName::JOINED_MEETING, MeetingRef { meeting_id })
    }

    pub fn error(err: &GatewayError) -> Self {
        Self::new(
            EventName::ERROR,
            ErrorPayload {
                code: err.code(),
                message: err.client_message(),
            },
        )
    }

    pub fn transcript_update(meeting_id: i64, transcript: &[TranscriptEntry]) -> Self {
        Self::new(
            EventName::TRANSCRIPT_UPDATE,
            TranscriptUpdate {
                meeting_id,
                transcript,
            },
        )
    }

    pub fn summary_update(meeting_id: i64, summary: Option<&MeetingSummary>) -> Self {
        Self::new(
            EventName::SUMMARY_UPDATE,
            SummaryUpdate {
                meeting_id,
                summary,
            },
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeetingRef {
    meeting_id: i64,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptUpdate<'a> {
    meeting_id: i64,
    transcript: &'a [TranscriptEntry],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryUpdate<'a> {
    meeting_id: i64,
    summary: Option<&'a MeetingSummary>,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// A raw frame received from a client, before the payload is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub t: String,
    #[serde(default)]
    pub d: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptPayload {
    pub meeting_id: FlexibleId,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub speaker_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPayload {
    pub meeting_id: FlexibleId,
    pub summary: SummaryDraft,
}

/// An inbound event with its payload decoded.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    JoinMeeting(FlexibleId),
    LeaveMeeting(FlexibleId),
    Transcript(TranscriptPayload),
    Summary(SummaryPayload),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinMeeting(_) => EventName::JOIN_MEETING,
            Self::LeaveMeeting(_) => EventName::LEAVE_MEETING,
            Self::Transcript(_) => EventName::TRANSCRIPT,
            Self::Summary(_) => EventName::SUMMARY,
        }
    }
}

impl TryFrom<ClientMessage> for ClientEvent {
    type Error = GatewayError;

    fn try_from(msg: ClientMessage) -> Result<Self, Self::Error> {
        match msg.t.as_str() {
            EventName::JOIN_MEETING => Ok(Self::JoinMeeting(payload(msg.d)?)),
            EventName::LEAVE_MEETING => Ok(Self::LeaveMeeting(payload(msg.d)?)),
            EventName::TRANSCRIPT => Ok(Self::Transcript(payload(msg.d)?)),
            EventName::SUMMARY => Ok(Self::Summary(payload(msg.d)?)),
            other => Err(GatewayError::BadPayload(format!("unknown event `{other}`"))),
        }
    }
}

fn payload<T: DeserializeOwned>(d: Value) -> Result<T, GatewayError> {
    serde_json::from_value(d).map_err(|e| GatewayError::BadPayload(e.to_string()))
}
