//! Chemical resupply.
//!
//! Consumption is recorded by the resolution workflow; this is the other
//! direction of the usage history, adding stock and logging a "Nạp thêm"
//! entry for it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::api::{ApiError, PoolApi};
use crate::models::{Chemical, Id, UsageAction, UsageEntry, User};

// ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockRequest {
    pub quantity: f64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Error)]
pub enum RestockError {
    #[error("restock quantity {0} must be a positive number")]
    InvalidQuantity(f64),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Add `request.quantity` to the stock of chemical `id` and record it.
///
/// The stock update is committed before the history entry is written; a
/// failed history write is returned as an error with the new stock in place.
pub async fn restock<A>(
    api: &A,
    actor: &User,
    id: &Id,
    request: &RestockRequest,
) -> Result<Chemical, RestockError>
where
    A: PoolApi + ?Sized,
{
    // ---
    if !request.quantity.is_finite() || request.quantity <= 0.0 {
        return Err(RestockError::InvalidQuantity(request.quantity));
    }

    let chemical = api.fetch_chemical(id).await?;
    let stored = api
        .set_chemical_quantity(&chemical, chemical.quantity + request.quantity)
        .await?;

    let entry = UsageEntry {
        chemical_id: stored.id.clone(),
        quantity: request.quantity,
        unit: stored.unit.clone(),
        adjusted_by: actor.id.clone(),
        pool_id: None,
        note: request.note.clone().unwrap_or_default(),
        action: UsageAction::Restock,
        reading_id: None,
    };
    api.append_usage(&entry).await?;

    info!(
        "Restocked {} by {} {} (now {})",
        stored.name, request.quantity, stored.unit, stored.quantity
    );
    Ok(stored)
}

/// Chemicals at or below their reorder level, lowest stock first.
pub fn reorder_list(chemicals: Vec<Chemical>) -> Vec<Chemical> {
    // ---
    let mut low: Vec<_> = chemicals.into_iter().filter(Chemical::needs_reorder).collect();
    low.sort_by(|a, b| a.quantity.total_cmp(&b.quantity));
    low
}
