//! HTTP surface: JSON routes over [`TodoService`], authenticated by a
//! cookie session.

pub mod auth;
pub mod error;
pub mod extract;
pub mod session;
pub mod tags;
pub mod todos;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::AppConfig;
use crate::service::TodoService;

pub use error::ApiError;
pub use session::CurrentUser;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub service: TodoService,
}

impl AppState {
    pub fn new(service: TodoService) -> Self {
        Self { service }
    }
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the full application router with session, trace and CORS layers.
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let idle = time::Duration::seconds(
        i64::try_from(config.session_idle_timeout.as_secs()).unwrap_or(i64::MAX),
    );
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(idle));

    Router::new()
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(todos::routes())
        .merge(tags::routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(sessions),
        )
}
