use axum::{extract::State, response::Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health - liveness plus a database ping; the status stays 200 either way
pub async fn health_get(State(state): State<AppState>) -> Json<Value> {
    let database = match state.db.health_check().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!("Health check database ping failed: {}", e);
            "unavailable".to_string()
        }
    };

    Json(json!({
        "status": "OK",
        "timestamp": Utc::now(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "database": database,
    }))
}
