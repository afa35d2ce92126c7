//! Realtime channel: authenticated WebSocket connections, meeting rooms,
//! and live transcript/summary fan-out.

pub mod events;
pub mod membership;
pub mod rooms;
pub mod router;
pub mod server;
pub mod session;

pub use router::EventRouter;
