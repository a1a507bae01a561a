use axum::Json;
use serde_json::{json, Value};

/// GET /health
/// The only path exempt from both the perimeter gate and the session gate.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cvbuilder-api"
    }))
}
