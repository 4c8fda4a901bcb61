use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let storage = match &state.database {
        None => "memory",
        Some(db) => match db.ping().await {
            Ok(()) => "postgres",
            Err(e) => {
                warn!("Health check database ping failed: {}", e);
                "postgres-unreachable"
            }
        },
    };

    Json(json!({
        "success": true,
        "status": "ok",
        "environment": state.config.environment,
        "storage": storage,
    }))
}
