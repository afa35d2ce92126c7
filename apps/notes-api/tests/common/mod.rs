#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use notes_api::auth::tokens::SESSION_TTL_SECS;
use notes_api::config::Config;
use notes_api::db::kv::{KeyValueStore, MemoryStore};
use notes_api::store::MemoryMeetingStore;
use notes_api::AppState;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Everything a test needs: the wired state plus handles on the in-memory
/// collaborators behind it.
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryMeetingStore>,
    pub kv: Arc<MemoryStore>,
}

impl TestContext {
    /// A valid session token for `user_id`.
    pub fn token_for(&self, user_id: i64) -> String {
        self.state
            .verifier
            .issue(user_id, SESSION_TTL_SECS)
            .expect("mint test token")
    }

    /// A correctly signed token that expired an hour ago.
    pub fn expired_token_for(&self, user_id: i64) -> String {
        self.state
            .verifier
            .issue(user_id, -3600)
            .expect("mint expired token")
    }
}

fn test_config() -> Config {
    Config {
        database_url: "postgres://unused/notes_test".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        redis_url: None,
        port: 0,
        frontend_url: "*".to_string(),
        app_env: "test".to_string(),
    }
}

/// Build a test AppState backed by in-memory stores.
pub fn test_state() -> TestContext {
    let store = Arc::new(MemoryMeetingStore::new());
    let kv = Arc::new(MemoryStore::new());
    let kv_dyn: Arc<dyn KeyValueStore> = kv.clone();
    let state = AppState::new(test_config(), store.clone(), kv_dyn);

    TestContext { state, store, kv }
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (Router, TestContext) {
    let ctx = test_state();
    let app = notes_api::routes::router().with_state(ctx.state.clone());
    (app, ctx)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background for the rest of the test.
pub async fn start_ws_server() -> (SocketAddr, TestContext) {
    let (app, ctx) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, ctx)
}
