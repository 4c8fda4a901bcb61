use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<Value>> {
    let wallet = state.user_service.wallet(user.id()).await?;
    Ok(Json(json!({
        "success": true,
        "wallet": wallet,
    })))
}
