mod errors;
mod handlers;
mod state;

use axum::Router;
use axum::routing::{get, post};

pub use state::HttpState;

pub fn router(state: HttpState) -> Router<()> {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/usage", get(handlers::usage))
        .route("/api/usage/:source", get(handlers::usage_source))
        .route("/api/status", get(handlers::status))
        .route("/api/refresh", post(handlers::refresh_all))
        .route("/api/refresh/:source", post(handlers::refresh_source))
        .route("/api/reset", post(handlers::reset))
        .with_state(state)
}
