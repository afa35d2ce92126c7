use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use notes_api::config::Config;
use notes_api::db::kv::{KeyValueStore, MemoryStore, RedisStore};
use notes_api::store::{MeetingStore, PgMeetingStore};
use notes_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let db = notes_api::db::pool::connect(&config.database_url);
    let store: Arc<dyn MeetingStore> = Arc::new(PgMeetingStore::new(db));
    let kv = denylist_store(config.redis_url.as_deref()).await;

    tracing::info!(env = %config.app_env, frontend = %config.frontend_url, "notes-api configured");

    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(&config.frontend_url))
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState::new(config, store, kv);

    let app = Router::new()
        .merge(notes_api::routes::router())
        .merge(
            SwaggerUi::new("/docs").url("/api-docs/openapi.json", notes_api::routes::ApiDoc::openapi()),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "notes-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

/// Redis when configured and reachable, otherwise process memory. Revocation
/// is best-effort either way.
async fn denylist_store(redis_url: Option<&str>) -> Arc<dyn KeyValueStore> {
    let Some(url) = redis_url else {
        tracing::info!("REDIS_URL not set, token denylist kept in memory");
        return Arc::new(MemoryStore::new());
    };

    match RedisStore::connect(url).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::warn!(%err, "redis unreachable, token denylist kept in memory");
            Arc::new(MemoryStore::new())
        }
    }
}

fn allowed_origin(frontend_url: &str) -> AllowOrigin {
    if frontend_url == "*" {
        return AllowOrigin::any();
    }
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(%frontend_url, "invalid FRONTEND_URL, allowing any origin");
            AllowOrigin::any()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
