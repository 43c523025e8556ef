use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use tracing::info;

use super::{AppError, AppState, CurrentSession};
use crate::api::PoolApi;
use crate::models::ReadingFilter;
use crate::summary::{summarize, FleetSummary};

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/summary", get(handler))
}

async fn handler(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<FleetSummary>, AppError> {
    // ---
    info!("GET /dashboard/summary");
    let client = session.client(&state);

    // One upstream request in flight per session.
    let pools = client.fetch_pools().await?;
    let readings = client.fetch_readings(&ReadingFilter::default()).await?;
    let chemicals = client.fetch_chemicals().await?;

    let summary = summarize(
        &pools,
        &readings,
        &chemicals,
        Utc::now(),
        state.config.summary_offset,
    );
    info!("Summary: {:?}", summary);
    Ok(Json(summary))
}
