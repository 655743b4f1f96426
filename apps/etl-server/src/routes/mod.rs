pub mod experiments;
pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(experiments::router())
        .nest("/api", crate::openapi::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
