pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;
use std::time::Instant;

use auth::tokens::TokenVerifier;
use config::Config;
use db::kv::KeyValueStore;
use gateway::EventRouter;
use store::MeetingStore;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MeetingStore>,
    pub verifier: TokenVerifier,
    pub realtime: Arc<EventRouter>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the verifier and realtime router around the given collaborators.
    pub fn new(config: Config, store: Arc<dyn MeetingStore>, kv: Arc<dyn KeyValueStore>) -> Self {
        let verifier = TokenVerifier::new(&config.jwt_secret, kv);
        let realtime = Arc::new(EventRouter::new(verifier.clone(), store.clone()));

        Self {
            store,
            verifier,
            realtime,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}
