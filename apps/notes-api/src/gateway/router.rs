//! Connection lifecycle and inbound event dispatch.

use std::sync::Arc;

use chrono::Utc;
use notes_common::clock;

use crate::auth::tokens::TokenVerifier;
use crate::error::{GatewayError, StoreError, TokenError};
use crate::models::id::FlexibleId;
use crate::models::meeting::MeetingSummary;
use crate::models::transcript::NewTranscript;
use crate::store::MeetingStore;

use super::events::{ClientEvent, ClientMessage, ServerMessage, SummaryPayload, TranscriptPayload};
use super::membership::{authorize_owner, RoomMembership};
use super::rooms::{Room, RoomRegistry};
use super::session::{outbound_queue, Connection, OutboundRx};

/// Owns the connection and room registries for one process and routes every
/// inbound event to its handler.
pub struct EventRouter {
    verifier: TokenVerifier,
    store: Arc<dyn MeetingStore>,
    rooms: Arc<RoomRegistry>,
    membership: RoomMembership,
}

impl EventRouter {
    pub fn new(verifier: TokenVerifier, store: Arc<dyn MeetingStore>) -> Self {
        let rooms = Arc::new(RoomRegistry::new());
        Self {
            membership: RoomMembership::new(store.clone(), rooms.clone()),
            verifier,
            store,
            rooms,
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Verify a handshake token. Nothing is registered on failure.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<i64, GatewayError> {
        let token = token.ok_or(TokenError::Missing)?;
        Ok(self.verifier.verify(token).await?)
    }

    /// Register an authenticated connection and place it in its private room.
    pub fn admit(&self, user_id: i64) -> (Connection, OutboundRx) {
        let conn = Connection::new(user_id);
        let (tx, rx) = outbound_queue();
        self.rooms.register(&conn, tx);
        self.membership.join_private_room(&conn);
        (conn, rx)
    }

    /// `authenticate` followed by `admit`.
    pub async fn connect(
        &self,
        token: Option<&str>,
    ) -> Result<(Connection, OutboundRx), GatewayError> {
        let user_id = self.authenticate(token).await?;
        Ok(self.admit(user_id))
    }

    /// Handle one inbound frame. Failures become an `error` event to the
    /// sender; the connection stays open.
    pub async fn dispatch(&self, conn: &Connection, message: ClientMessage) {
        if !self.rooms.is_connected(&conn.id) {
            return;
        }

        let result = match ClientEvent::try_from(message) {
            Ok(event) => {
                let name = event.name();
                self.handle(conn, event).await.inspect_err(|err| {
                    tracing::debug!(
                        connection_id = %conn.id,
                        user_id = conn.user_id,
                        event = name,
                        %err,
                        "realtime event rejected"
                    );
                })
            }
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            self.reject(conn, &err);
        }
    }

    /// Report a failure to the originating connection only.
    pub fn reject(&self, conn: &Connection, err: &GatewayError) {
        if let GatewayError::DependencyUnavailable(cause) = err {
            tracing::warn!(connection_id = %conn.id, error = %cause, "store unavailable");
        }
        self.rooms.send_to(&conn.id, ServerMessage::error(err));
    }

    async fn handle(&self, conn: &Connection, event: ClientEvent) -> Result<(), GatewayError> {
        match event {
            ClientEvent::JoinMeeting(id) => {
                let meeting_id = resolve(&id)?;
                self.membership.join_meeting_room(conn, meeting_id).await
            }
            ClientEvent::LeaveMeeting(id) => {
                if let Some(meeting_id) = id.as_i64() {
                    self.membership.leave_meeting_room(conn, meeting_id);
                }
                Ok(())
            }
            ClientEvent::Transcript(payload) => self.on_transcript(conn, payload).await,
            ClientEvent::Summary(payload) => self.on_summary(conn, payload).await,
        }
    }

    async fn on_transcript(
        &self,
        conn: &Connection,
        payload: TranscriptPayload,
    ) -> Result<(), GatewayError> {
        let meeting_id = resolve(&payload.meeting_id)?;
        authorize_owner(self.store.as_ref(), conn.user_id, meeting_id).await?;

        self.store
            .append_transcript(NewTranscript {
                meeting_id,
                text: payload.text,
                timestamp: clock::or_now(payload.timestamp),
                speaker_id: payload.speaker_id,
                speaker_name: payload.speaker_name,
                is_highlighted: false,
                confidence: None,
            })
            .await?;

        let delivered = self.publish_transcript(meeting_id).await?;
        tracing::debug!(connection_id = %conn.id, meeting_id, delivered, "transcript broadcast");
        Ok(())
    }

    async fn on_summary(
        &self,
        conn: &Connection,
        payload: SummaryPayload,
    ) -> Result<(), GatewayError> {
        let meeting_id = resolve(&payload.meeting_id)?;
        authorize_owner(self.store.as_ref(), conn.user_id, meeting_id).await?;

        let summary = payload.summary.stamp(Utc::now());
        self.store.replace_summary(meeting_id, &summary).await?;

        let meeting = self
            .store
            .get_meeting(meeting_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(meeting_id.to_string()))?;

        let delivered = self.publish_summary(meeting_id, meeting.summary.as_ref());
        tracing::debug!(connection_id = %conn.id, meeting_id, delivered, "summary broadcast");
        Ok(())
    }

    /// Re-read the ordered transcript of a meeting and push it to the
    /// meeting room. Returns how many connections it was queued for.
    pub async fn publish_transcript(&self, meeting_id: i64) -> Result<usize, StoreError> {
        let transcript = self.store.list_transcripts(meeting_id).await?;
        Ok(self.rooms.broadcast(
            Room::Meeting(meeting_id),
            ServerMessage::transcript_update(meeting_id, &transcript),
        ))
    }

    pub fn publish_summary(&self, meeting_id: i64, summary: Option<&MeetingSummary>) -> usize {
        self.rooms.broadcast(
            Room::Meeting(meeting_id),
            ServerMessage::summary_update(meeting_id, summary),
        )
    }

    /// Release every membership of a connection. Events still in flight for
    /// it are dropped from here on.
    pub fn disconnect(&self, conn: &Connection) {
        let released = self.rooms.remove(&conn.id);
        tracing::debug!(
            connection_id = %conn.id,
            user_id = conn.user_id,
            rooms = released.len(),
            "connection released"
        );
    }
}

fn resolve(id: &FlexibleId) -> Result<i64, GatewayError> {
    id.as_i64().ok_or_else(|| GatewayError::NotFound(id.raw()))
}
