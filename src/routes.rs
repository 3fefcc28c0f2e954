mod drink;

use axum::Json;
use serde_json::{Value, json};

pub use drink::{create_drink, delete_drink, fetch_drinks, fetch_drinks_detail, update_drink};

pub async fn welcome() -> Json<Value> {
    Json(json!({"success": true, "message": "Welcome to Coffee shop api"}))
}
