use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let (store_ok, backend) = match state.event_store.as_deref() {
        Some(store) => match store.health_check().await {
            Ok(()) => (true, Some(store.backend_name())),
            Err(error) => {
                tracing::error!(error = %error, backend = store.backend_name(), "Event store health check failed");
                (false, Some(store.backend_name()))
            }
        },
        None => (false, None),
    };

    let status = if store_ok { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "now": Utc::now().to_rfc3339(),
        "event_store": backend
    }))
}
