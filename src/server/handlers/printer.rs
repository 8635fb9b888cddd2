//! Bridge action handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::PrintError;

use super::super::state::AppState;

/// Handle POST /api/printer/:action - run a bridge action.
///
/// The body is the positional argument array.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
    Json(args): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    state
        .bridge
        .execute(&action, args)
        .await
        .map(Json)
        .map_err(|e| (status_for(&e), e.to_string()))
}

/// Handle GET /api/printer/types - list printable type identifiers.
pub async fn types(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.bridge.printer().printable_types()))
}

fn status_for(error: &PrintError) -> StatusCode {
    match error {
        PrintError::UnknownAction(_) => StatusCode::NOT_FOUND,
        PrintError::InvalidArgument(_) | PrintError::Json(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
