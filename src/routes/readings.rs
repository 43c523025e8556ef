use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::{AppError, AppState, CurrentSession};
use crate::api::PoolApi;
use crate::models::{Id, ReadingFilter, WaterQualityReading};
use crate::resolution::{self, ResolutionReceipt, ResolutionRequest, ResolveError};
use crate::thresholds::EvaluatedReading;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/readings", get(list))
        .route("/readings/{id}", get(fetch))
        .route("/readings/{id}/resolve", post(resolve))
}

/// Query parameters for filtering readings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsQuery {
    pool_name: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    created_by_id: Option<String>,
    /// Keep only readings whose needs-action flag matches.
    needs_action: Option<bool>,
}

impl ReadingsQuery {
    fn upstream_filter(&self) -> ReadingFilter {
        ReadingFilter {
            pool_name: self.pool_name.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            created_by_id: self.created_by_id.clone(),
        }
    }
}

async fn list(
    session: CurrentSession,
    State(state): State<AppState>,
    Query(params): Query<ReadingsQuery>,
) -> Result<Json<Vec<EvaluatedReading>>, AppError> {
    // ---
    info!("GET /readings - {:?}", params);

    let readings = session
        .client(&state)
        .fetch_readings(&params.upstream_filter())
        .await?;
    debug!("Fetched {} readings", readings.len());

    let evaluated = evaluate_all(readings, params.needs_action)?;
    info!("Returning {} readings", evaluated.len());
    Ok(Json(evaluated))
}

/// Classify every reading, optionally keep one needs-action class, newest first.
fn evaluate_all(
    readings: Vec<WaterQualityReading>,
    needs_action: Option<bool>,
) -> Result<Vec<EvaluatedReading>, AppError> {
    // ---
    let mut evaluated = readings
        .into_iter()
        .map(WaterQualityReading::evaluate)
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(flag) = needs_action {
        evaluated.retain(|r| r.needs_action == flag);
    }
    evaluated.sort_by(|a, b| b.reading.timestamp.cmp(&a.reading.timestamp));
    Ok(evaluated)
}

async fn fetch(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EvaluatedReading>, AppError> {
    // ---
    let reading = session.client(&state).fetch_reading(&Id(id)).await?;
    Ok(Json(reading.evaluate()?))
}

async fn resolve(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ResolutionRequest>,
) -> Result<Json<ResolutionReceipt>, AppError> {
    // ---
    let id = Id(id);
    info!("POST /readings/{}/resolve - {} line(s)", id, request.lines.len());

    let _claim = state
        .in_flight
        .try_claim(&id)
        .ok_or_else(|| ResolveError::InFlight(id.clone()))?;

    let client = session.client(&state);
    let reading = client.fetch_reading(&id).await?;
    let receipt = resolution::resolve(&client, session.user(), &reading, &request).await?;

    Ok(Json(receipt))
}
