use axum::{routing::get, Router};

use crate::state::AppState;

pub mod analytics;
pub mod health;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(analytics::router())
}
