//! Room membership rules: who may join which room.

use std::sync::Arc;

use crate::error::GatewayError;
use crate::models::meeting::Meeting;
use crate::store::MeetingStore;

use super::events::ServerMessage;
use super::rooms::{Room, RoomRegistry};
use super::session::Connection;

/// Load a meeting and check that `user_id` owns it.
///
/// Called for every state-changing event, never cached, so a meeting that
/// changes owner is locked out immediately.
pub async fn authorize_owner(
    store: &dyn MeetingStore,
    user_id: i64,
    meeting_id: i64,
) -> Result<Meeting, GatewayError> {
    let meeting = store
        .get_meeting(meeting_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(meeting_id.to_string()))?;

    if !meeting.is_owned_by(user_id) {
        return Err(GatewayError::AuthorizationFailure(meeting_id));
    }

    Ok(meeting)
}

pub struct RoomMembership {
    store: Arc<dyn MeetingStore>,
    rooms: Arc<RoomRegistry>,
}

impl RoomMembership {
    pub fn new(store: Arc<dyn MeetingStore>, rooms: Arc<RoomRegistry>) -> Self {
        Self { store, rooms }
    }

    /// Put a connection in its user's private room. Done once at connect.
    pub fn join_private_room(&self, conn: &Connection) {
        self.rooms.join(&conn.id, Room::User(conn.user_id));
    }

    /// Join the room of a meeting the connection's user owns, then confirm
    /// with `joined-meeting` to the requester only.
    pub async fn join_meeting_room(
        &self,
        conn: &Connection,
        meeting_id: i64,
    ) -> Result<(), GatewayError> {
        authorize_owner(self.store.as_ref(), conn.user_id, meeting_id).await?;

        if self.rooms.join(&conn.id, Room::Meeting(meeting_id)) {
            self.rooms
                .send_to(&conn.id, ServerMessage::joined_meeting(meeting_id));
            tracing::debug!(
                connection_id = %conn.id,
                user_id = conn.user_id,
                meeting_id,
                "joined meeting room"
            );
        }
        Ok(())
    }

    /// Leave a meeting room. No ownership check; leaving a room the
    /// connection is not in does nothing.
    pub fn leave_meeting_room(&self, conn: &Connection, meeting_id: i64) {
        self.rooms.leave(&conn.id, Room::Meeting(meeting_id));
    }
}
