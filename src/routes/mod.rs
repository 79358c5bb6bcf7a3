pub mod blogs;
pub mod comments;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::response::Envelope;
use crate::state::AppState;

/// The full HTTP surface, ready to serve.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(blogs::router())
        .merge(comments::router())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Envelope {
    Envelope::ok()
}

async fn not_found() -> Envelope {
    Envelope::new(StatusCode::NOT_FOUND, "Not found")
}
