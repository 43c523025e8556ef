use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use super::{AdminSession, AppError, AppState, CurrentSession};
use crate::api::PoolApi;
use crate::inventory::{reorder_list, restock, RestockRequest};
use crate::models::{Chemical, Id};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/chemicals/{id}/restock", post(restock_handler))
        .route("/inventory/reorder", get(reorder_handler))
}

async fn restock_handler(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RestockRequest>,
) -> Result<Json<Chemical>, AppError> {
    // ---
    info!("POST /chemicals/{}/restock - {}", id, request.quantity);
    let client = session.client(&state);
    let stored = restock(&client, session.user(), &Id(id), &request).await?;
    Ok(Json(stored))
}

async fn reorder_handler(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Chemical>>, AppError> {
    // ---
    let chemicals = session.client(&state).fetch_chemicals().await?;
    Ok(Json(reorder_list(chemicals)))
}
