//! In-memory registry of live connections and the rooms they belong to.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;

use super::events::ServerMessage;
use super::session::{Connection, Outbound};

/// A broadcast group. Rooms exist only while they have members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    /// Private room of one user, joined by every connection of that user.
    User(i64),
    /// Shared room of a meeting, joined on request.
    Meeting(i64),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Meeting(id) => write!(f, "meeting:{id}"),
        }
    }
}

struct ConnectionEntry {
    user_id: i64,
    rooms: HashSet<Room>,
    outbound: Outbound,
}

/// Shared registry of connections and room membership.
///
/// Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
/// connection entry. Lock order is always connection entry, then room.
#[derive(Default)]
pub struct RoomRegistry {
    connections: DashMap<String, Mutex<ConnectionEntry>>,
    rooms: DashMap<Room, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly authenticated connection.
    pub fn register(&self, conn: &Connection, outbound: Outbound) {
        self.connections.insert(
            conn.id.clone(),
            Mutex::new(ConnectionEntry {
                user_id: conn.user_id,
                rooms: HashSet::new(),
                outbound,
            }),
        );
    }

    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Add a connection to a room.
    ///
    /// Returns `false` without touching the room when the connection has
    /// already been removed, so a join racing a disconnect cannot leave a
    /// dangling member behind.
    pub fn join(&self, connection_id: &str, room: Room) -> bool {
        let Some(entry) = self.connections.get(connection_id) else {
            return false;
        };
        let mut entry = entry.lock();
        self.rooms
            .entry(room)
            .or_default()
            .insert(connection_id.to_string());
        entry.rooms.insert(room);
        true
    }

    /// Remove a connection from a room. Idempotent.
    pub fn leave(&self, connection_id: &str, room: Room) {
        if let Some(entry) = self.connections.get(connection_id) {
            entry.lock().rooms.remove(&room);
        }
        self.drop_member(room, connection_id);
    }

    /// Forget a connection and release every room it was in.
    /// Returns the rooms it was a member of.
    pub fn remove(&self, connection_id: &str) -> Vec<Room> {
        let Some((_, entry)) = self.connections.remove(connection_id) else {
            return Vec::new();
        };
        let rooms: Vec<Room> = entry.into_inner().rooms.into_iter().collect();
        for room in &rooms {
            self.drop_member(*room, connection_id);
        }
        rooms
    }

    fn drop_member(&self, room: Room, connection_id: &str) {
        if let Some(mut members) = self.rooms.get_mut(&room) {
            members.remove(connection_id);
        }
        self.rooms.remove_if(&room, |_, members| members.is_empty());
    }

    /// Snapshot of the connection ids currently in `room`.
    pub fn members(&self, room: Room) -> Vec<String> {
        self.rooms
            .get(&room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, connection_id: &str, room: Room) -> bool {
        self.rooms
            .get(&room)
            .is_some_and(|m| m.contains(connection_id))
    }

    /// Rooms a connection is currently in.
    pub fn rooms_of(&self, connection_id: &str) -> Vec<Room> {
        self.connections
            .get(connection_id)
            .map(|e| e.lock().rooms.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn user_of(&self, connection_id: &str) -> Option<i64> {
        self.connections.get(connection_id).map(|e| e.lock().user_id)
    }

    /// Queue a message for one connection. Returns whether it was queued.
    pub fn send_to(&self, connection_id: &str, message: ServerMessage) -> bool {
        self.deliver(connection_id, &Arc::new(message))
    }

    /// Queue a message for every current member of `room`.
    /// Returns the number of connections it was queued for.
    pub fn broadcast(&self, room: Room, message: ServerMessage) -> usize {
        let message = Arc::new(message);
        self.members(room)
            .iter()
            .filter(|id| self.deliver(id, &message))
            .count()
    }

    /// Queue without waiting. A connection whose queue is full is not
    /// reading its socket and gets removed; its writer sees the queue close.
    fn deliver(&self, connection_id: &str, message: &Arc<ServerMessage>) -> bool {
        let queued = match self.connections.get(connection_id) {
            Some(entry) => entry.lock().outbound.try_send(message.clone()),
            None => return false,
        };
        match queued {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(connection_id, "outbound queue full, dropping slow connection");
                self.remove(connection_id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
