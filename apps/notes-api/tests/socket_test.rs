mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use notes_api::gateway::rooms::Room;
use notes_api::store::MeetingStore;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper: open an authenticated socket using the `?token=` handshake.
async fn connect(addr: SocketAddr, token: &str) -> Socket {
    let url = format!("ws://{addr}/socket?token={token}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

async fn send(ws: &mut Socket, t: &str, d: Value) {
    let frame = json!({ "t": t, "d": d });
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// Helper: read the next event frame, skipping control frames.
async fn recv(ws: &mut Socket) -> Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended")
            .expect("ws read error");

        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("parse event");
        }
    }
}

/// Helper: assert no event frame arrives within a short window.
async fn assert_silent(ws: &mut Socket) {
    let result = time::timeout(Duration::from_millis(300), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.as_str().to_owned()),
                Some(Ok(_)) => continue,
                _ => return None,
            }
        }
    })
    .await;

    if let Ok(Some(text)) = result {
        panic!("expected no event, got {text}");
    }
}

/// Poll until the registry reflects a condition; socket cleanup runs after
/// the close frame is processed.
async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..50 {
        if check() {
            return;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handshake_without_token_is_rejected() {
    let (addr, ctx) = common::start_ws_server().await;

    let err = tokio_tungstenite::connect_async(format!("ws://{addr}/socket"))
        .await
        .expect_err("handshake should fail");

    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status().as_u16(), 401),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ctx.state.realtime.rooms().connection_count(), 0);
}

#[tokio::test]
async fn handshake_with_bad_or_expired_token_is_rejected() {
    let (addr, ctx) = common::start_ws_server().await;

    for token in ["garbage".to_string(), ctx.expired_token_for(1)] {
        let err = tokio_tungstenite::connect_async(format!("ws://{addr}/socket?token={token}"))
            .await
            .expect_err("handshake should fail");
        assert!(matches!(err, tungstenite::Error::Http(ref r) if r.status().as_u16() == 401));
    }

    assert!(ctx.state.realtime.rooms().members(Room::User(1)).is_empty());
}

#[tokio::test]
async fn handshake_with_revoked_token_is_rejected() {
    let (addr, ctx) = common::start_ws_server().await;
    let token = ctx.token_for(1);
    ctx.state.verifier.revoke(&token).await.unwrap();

    let result = tokio_tungstenite::connect_async(format!("ws://{addr}/socket?token={token}")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn handshake_accepts_bearer_header() {
    let (addr, ctx) = common::start_ws_server().await;
    let token = ctx.token_for(7);

    let mut request = format!("ws://{addr}/socket").into_client_request().unwrap();
    request.headers_mut().insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    let (_ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("ws connect");

    let rooms = ctx.state.realtime.rooms();
    eventually(|| rooms.members(Room::User(7)).len() == 1).await;
}

// ---------------------------------------------------------------------------
// Meeting rooms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn owner_transcript_reaches_room_and_stranger_is_refused() {
    let (addr, ctx) = common::start_ws_server().await;
    ctx.store.seed_meeting(42, 1, "Weekly sync");

    let mut c1 = connect(addr, &ctx.token_for(1)).await;
    let mut c2 = connect(addr, &ctx.token_for(2)).await;

    send(&mut c1, "join-meeting", json!("42")).await;
    assert_eq!(recv(&mut c1).await, json!({ "t": "joined-meeting", "d": { "meetingId": 42 } }));

    send(&mut c2, "join-meeting", json!("42")).await;
    let err = recv(&mut c2).await;
    assert_eq!(err["t"], "error");
    assert_eq!(err["d"]["code"], "FORBIDDEN");

    send(
        &mut c1,
        "transcript",
        json!({ "meetingId": 42, "text": "hello", "timestamp": 100 }),
    )
    .await;

    let update = recv(&mut c1).await;
    assert_eq!(update["t"], "transcript-update");
    assert_eq!(update["d"]["meetingId"], 42);
    let transcript = update["d"]["transcript"].as_array().unwrap();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0]["text"], "hello");
    assert_eq!(transcript[0]["timestamp"], 100);

    let stored = ctx.store.list_transcripts(42).await.unwrap();
    assert_eq!(stored.len(), 1);

    assert_silent(&mut c2).await;
}

#[tokio::test]
async fn summary_is_persisted_and_broadcast_to_all_members() {
    let (addr, ctx) = common::start_ws_server().await;
    ctx.store.seed_meeting(42, 1, "Weekly sync");

    let token = ctx.token_for(1);
    let mut c1 = connect(addr, &token).await;
    let mut c2 = connect(addr, &token).await;
    for ws in [&mut c1, &mut c2] {
        send(ws, "join-meeting", json!(42)).await;
        assert_eq!(recv(ws).await["t"], "joined-meeting");
    }

    send(
        &mut c1,
        "summary",
        json!({ "meetingId": 42, "summary": { "keywords": ["x"], "summary": "s", "todos": [] } }),
    )
    .await;

    for ws in [&mut c1, &mut c2] {
        let update = recv(ws).await;
        assert_eq!(update["t"], "summary-update");
        assert_eq!(update["d"]["meetingId"], 42);
        assert_eq!(update["d"]["summary"]["keywords"], json!(["x"]));
        assert!(update["d"]["summary"]["lastUpdated"].is_string());
    }

    let meeting = ctx.store.get_meeting(42).await.unwrap().unwrap();
    let summary = meeting.summary.expect("summary persisted");
    assert_eq!(summary.content.keywords, vec!["x".to_string()]);
}

#[tokio::test]
async fn malformed_frames_get_an_error_and_keep_the_socket() {
    let (addr, ctx) = common::start_ws_server().await;
    ctx.store.seed_meeting(42, 1, "Weekly sync");
    let mut ws = connect(addr, &ctx.token_for(1)).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    assert_eq!(recv(&mut ws).await["d"]["code"], "BAD_REQUEST");

    send(&mut ws, "join-meeting", json!(42)).await;
    assert_eq!(recv(&mut ws).await["t"], "joined-meeting");
}

#[tokio::test]
async fn store_outage_is_reported_per_event() {
    let (addr, ctx) = common::start_ws_server().await;
    ctx.store.seed_meeting(42, 1, "Weekly sync");
    let mut ws = connect(addr, &ctx.token_for(1)).await;

    ctx.store.set_unavailable(true);
    send(&mut ws, "join-meeting", json!(42)).await;
    assert_eq!(recv(&mut ws).await["d"]["code"], "UNAVAILABLE");

    ctx.store.set_unavailable(false);
    send(&mut ws, "join-meeting", json!(42)).await;
    assert_eq!(recv(&mut ws).await["t"], "joined-meeting");
}

#[tokio::test]
async fn disconnect_releases_every_room() {
    let (addr, ctx) = common::start_ws_server().await;
    ctx.store.seed_meeting(42, 1, "Weekly sync");

    let mut ws = connect(addr, &ctx.token_for(1)).await;
    send(&mut ws, "join-meeting", json!(42)).await;
    assert_eq!(recv(&mut ws).await["t"], "joined-meeting");

    let rooms = ctx.state.realtime.rooms();
    assert_eq!(rooms.members(Room::Meeting(42)).len(), 1);

    ws.close(None).await.unwrap();
    drop(ws);

    eventually(|| rooms.connection_count() == 0).await;
    assert!(rooms.members(Room::Meeting(42)).is_empty());
    assert!(rooms.members(Room::User(1)).is_empty());
}

#[tokio::test]
async fn rest_transcript_append_is_pushed_to_room() {
    let (addr, ctx) = common::start_ws_server().await;
    ctx.store.seed_meeting(42, 1, "Weekly sync");
    let token = ctx.token_for(1);

    let mut ws = connect(addr, &token).await;
    send(&mut ws, "join-meeting", json!(42)).await;
    assert_eq!(recv(&mut ws).await["t"], "joined-meeting");

    let server = axum_test::TestServer::new(
        notes_api::routes::router().with_state(ctx.state.clone()),
    )
    .unwrap();
    server
        .post("/api/transcripts/42")
        .authorization_bearer(&token)
        .json(&json!({ "text": "typed note", "timestamp": 5 }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let update = recv(&mut ws).await;
    assert_eq!(update["t"], "transcript-update");
    assert_eq!(update["d"]["transcript"][0]["text"], "typed note");
}
