//! Per-connection realtime state.

use std::sync::Arc;

use notes_common::id::prefix;
use notes_common::PrefixedId;
use tokio::sync::mpsc;

use super::events::ServerMessage;

/// Events that may wait for one connection's writer. A connection that lets
/// its queue fill up is dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Sending half of a connection's outbound queue.
pub type Outbound = mpsc::Sender<Arc<ServerMessage>>;
/// Receiving half, drained by the socket writer.
pub type OutboundRx = mpsc::Receiver<Arc<ServerMessage>>;

pub fn outbound_queue() -> (Outbound, OutboundRx) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// Cheap, cloneable handle identifying one authenticated connection.
///
/// A handle only exists once the handshake token has verified; the
/// connection counts as closed as soon as the registry drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Unique connection identifier (`conn_` prefixed ULID).
    pub id: String,
    /// User the connection authenticated as. Never changes.
    pub user_id: i64,
}

impl Connection {
    pub fn new(user_id: i64) -> Self {
        Self {
            id: Self::generate(),
            user_id,
        }
    }
}

impl PrefixedId for Connection {
    const PREFIX: &'static str = prefix::CONNECTION;
}
