//! API router.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers::{diag, groceries, health, negotiate};
use crate::state::AppState;

/// Create the API router.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health::health_check))
        .route("/v1/realtime/offer", post(negotiate::relay_offer))
        .route("/v1/groceries/parse", post(groceries::parse_transcript))
        .route(
            "/v1/diag",
            get(diag::list_entries).delete(diag::clear_entries),
        )
        .layer(TraceLayer::new_for_http())
}
