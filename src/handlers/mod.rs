pub mod auth;
pub mod budget;
pub mod dashboard;
pub mod expenses;
pub mod tasks;

use axum::Json;
use serde_json::json;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "message": "Festa event budget API is running",
    }))
}
