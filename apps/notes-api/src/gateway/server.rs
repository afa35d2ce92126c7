//! WebSocket upgrade handler and per-connection event loop.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::auth::middleware::bearer_token;
use crate::error::{ApiError, GatewayError};
use crate::AppState;

use super::events::{ClientMessage, ServerMessage};
use super::router::EventRouter;
use super::session::{Connection, OutboundRx};

/// Parsed events waiting for the connection's worker.
const INBOUND_CAPACITY: usize = 32;

/// Socket liveness timings.
#[derive(Debug, Clone, Copy)]
struct Timings {
    /// How often the server pings the client.
    ping_interval: Duration,
    /// A connection silent for this long is closed.
    idle_timeout: Duration,
    /// A single frame write taking longer than this means the client
    /// stopped reading.
    write_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(25),
            idle_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HandshakeParams {
    token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/socket", get(ws_upgrade))
}

/// Verify the handshake token before upgrading. A rejected handshake is a
/// plain 401 and no connection is ever registered.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<HandshakeParams>,
    headers: HeaderMap,
) -> Response {
    let token = params
        .token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| bearer_token(&headers));

    let user_id = match state.realtime.authenticate(token).await {
        Ok(user_id) => user_id,
        Err(err) => {
            tracing::debug!(%err, "socket handshake rejected");
            let message = match err {
                GatewayError::AuthenticationFailure(e) => e.client_message(),
                _ => "Authentication failed",
            };
            return ApiError::unauthorized(message).into_response();
        }
    };

    let router = state.realtime.clone();
    ws.on_upgrade(move |socket| {
        let (ws_tx, ws_rx) = socket.split();
        serve(router, user_id, ws_tx, ws_rx, Timings::default())
    })
    .into_response()
}

/// Admit an authenticated user, run the connection until it ends, then
/// release every room it held.
async fn serve<S, R>(
    router: Arc<EventRouter>,
    user_id: i64,
    ws_tx: S,
    ws_rx: R,
    timings: Timings,
) where
    S: Sink<Message> + Unpin,
    S::Error: Debug,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let (conn, outbound_rx) = router.admit(user_id);
    tracing::info!(connection_id = %conn.id, user_id, "realtime connection established");

    let (events_tx, events_rx) = mpsc::channel(INBOUND_CAPACITY);
    tokio::spawn(process_events(router.clone(), conn.clone(), events_rx));

    run_connection(&router, &conn, ws_tx, ws_rx, outbound_rx, events_tx, timings).await;

    router.disconnect(&conn);
    tracing::info!(connection_id = %conn.id, user_id, "realtime connection closed");
}

/// Handle one connection's events in arrival order, so room members see its
/// transcript updates in the order they were sent. A slow store call only
/// holds up this connection. Ends once the socket loop drops its sender.
async fn process_events(
    router: Arc<EventRouter>,
    conn: Connection,
    mut events: mpsc::Receiver<ClientMessage>,
) {
    while let Some(message) = events.recv().await {
        router.dispatch(&conn, message).await;
    }
}

/// Main loop: read client frames, flush queued outbound events, ping idle
/// clients and close silent ones.
async fn run_connection<S, R>(
    router: &EventRouter,
    conn: &Connection,
    mut ws_tx: S,
    mut ws_rx: R,
    mut outbound_rx: OutboundRx,
    events: mpsc::Sender<ClientMessage>,
    timings: Timings,
) where
    S: Sink<Message> + Unpin,
    S::Error: Debug,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut ping_timer = time::interval(timings.ping_interval);
    ping_timer.tick().await; // First tick fires immediately; skip it.
    let idle = time::sleep(timings.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                idle.as_mut().reset(Instant::now() + timings.idle_timeout);
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => {
                                if events.try_send(message).is_err() {
                                    router.reject(conn, &GatewayError::Busy);
                                }
                            }
                            Err(e) => {
                                router.reject(conn, &GatewayError::BadPayload(e.to_string()));
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %conn.id, "ws read error");
                        break;
                    }
                    // Pings are answered by axum; binary frames are ignored.
                    Some(Ok(_)) => {}
                }
            }

            queued = outbound_rx.recv() => {
                let Some(message) = queued else { break };
                let Some(frame) = encode(&message) else { continue };
                if !write_frame(&mut ws_tx, conn, frame, timings.write_timeout).await {
                    break;
                }
            }

            _ = ping_timer.tick() => {
                let ping = Message::Ping(Default::default());
                if !write_frame(&mut ws_tx, conn, ping, timings.write_timeout).await {
                    break;
                }
            }

            () = &mut idle => {
                tracing::debug!(connection_id = %conn.id, "idle timeout, closing connection");
                let close = Message::Close(None);
                let _ = write_frame(&mut ws_tx, conn, close, timings.write_timeout).await;
                break;
            }
        }
    }
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(?e, event = %message.t, "failed to encode outbound event");
            None
        }
    }
}

/// Returns `false` when the connection should be abandoned.
async fn write_frame<S>(
    ws_tx: &mut S,
    conn: &Connection,
    frame: Message,
    write_timeout: Duration,
) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: Debug,
{
    match time::timeout(write_timeout, ws_tx.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(?e, connection_id = %conn.id, "ws write error");
            false
        }
        Err(_) => {
            tracing::warn!(connection_id = %conn.id, "client stopped reading, closing connection");
            false
        }
    }
}
