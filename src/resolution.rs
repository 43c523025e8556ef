//! Alert resolution workflow.
//!
//! A reading that is out of range and unresolved is an open alert. An
//! operator closes it by consuming chemicals to treat the pool: stock is
//! checked for every line first, then decremented, one usage entry is written
//! per chemical, and only then is the reading marked resolved.
//!
//! The chain is strictly sequential and has no rollback. If a step fails
//! after validation, the reading stays unresolved and the error reports which
//! steps the upstream API already committed so the operator can reconcile.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::api::{ApiError, PoolApi};
use crate::models::{
    Chemical, Id, ResolveUpdate, UsageAction, UsageEntry, User, WaterQualityReading,
};
use crate::thresholds::{ReadingError, WaterStatus};

// ---

/// Where a reading sits in the alert lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertState {
    Normal,
    UnresolvedAlert,
    ResolvedAlert,
}

impl AlertState {
    pub fn of(status: WaterStatus, resolved: bool) -> Self {
        match (status, resolved) {
            (WaterStatus::Normal, _) => AlertState::Normal,
            (_, false) => AlertState::UnresolvedAlert,
            (_, true) => AlertState::ResolvedAlert,
        }
    }
}

/// One chemical an operator used to treat the pool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationLine {
    pub chemical_id: Id,
    pub quantity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRequest {
    pub lines: Vec<RemediationLine>,
    #[serde(default)]
    pub note: Option<String>,
}

/// A mutation sent to the upstream API during resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", content = "chemicalId", rename_all = "camelCase")]
pub enum Step {
    DecrementStock(Id),
    RecordUsage(Id),
    MarkResolved,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::DecrementStock(id) => write!(f, "decrement stock of chemical {id}"),
            Step::RecordUsage(id) => write!(f, "record usage of chemical {id}"),
            Step::MarkResolved => write!(f, "mark reading resolved"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("reading {0} is within range; there is nothing to resolve")]
    NotAnAlert(Id),

    #[error("reading {0} is already resolved")]
    AlreadyResolved(Id),

    #[error("reading {0} is already being resolved")]
    InFlight(Id),

    #[error(transparent)]
    InvalidReading(#[from] ReadingError),

    #[error("at least one chemical must be used to resolve an alert")]
    NoRemediation,

    #[error("quantity {quantity} for chemical {chemical_id} must be a positive number")]
    InvalidQuantity { chemical_id: Id, quantity: f64 },

    #[error("chemical {0} does not exist")]
    UnknownChemical(Id),

    #[error("not enough {name}: requested {requested}, available {available}")]
    InsufficientStock {
        chemical_id: Id,
        name: String,
        requested: f64,
        available: f64,
    },

    #[error("could not load current stock: {0}")]
    Lookup(#[source] ApiError),

    #[error("failed to {step} (already committed: {})", describe(.committed))]
    Apply {
        step: Step,
        committed: Vec<Step>,
        #[source]
        source: ApiError,
    },
}

impl ResolveError {
    // ---
    /// Rejected before any upstream mutation because the request was invalid.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ResolveError::NoRemediation
                | ResolveError::InvalidQuantity { .. }
                | ResolveError::UnknownChemical(_)
                | ResolveError::InsufficientStock { .. }
        )
    }

    /// Rejected because of the reading's current lifecycle state.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ResolveError::NotAnAlert(_) | ResolveError::AlreadyResolved(_) | ResolveError::InFlight(_)
        )
    }
}

fn describe(steps: &[Step]) -> String {
    if steps.is_empty() {
        return "nothing".to_string();
    }
    steps.iter().map(Step::to_string).collect::<Vec<_>>().join(", ")
}

/// Stock consumed by a successful resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumedChemical {
    pub chemical_id: Id,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub remaining: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReceipt {
    pub attempt_id: Uuid,
    pub reading_id: Id,
    pub resolved_by: Id,
    pub consumed: Vec<ConsumedChemical>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Resolve an open alert on `reading` on behalf of `actor`.
pub async fn resolve<A>(
    api: &A,
    actor: &User,
    reading: &WaterQualityReading,
    request: &ResolutionRequest,
) -> Result<ResolutionReceipt, ResolveError>
where
    A: PoolApi + ?Sized,
{
    // ---
    let attempt_id = Uuid::new_v4();
    let span = info_span!("resolve", reading = %reading.id, attempt = %attempt_id);

    run(api, actor, reading, request)
        .instrument(span)
        .await
        .map(|consumed| ResolutionReceipt {
            attempt_id,
            reading_id: reading.id.clone(),
            resolved_by: actor.id.clone(),
            consumed,
        })
}

async fn run<A>(
    api: &A,
    actor: &User,
    reading: &WaterQualityReading,
    request: &ResolutionRequest,
) -> Result<Vec<ConsumedChemical>, ResolveError>
where
    A: PoolApi + ?Sized,
{
    // ---
    match AlertState::of(reading.status()?, reading.resolved) {
        AlertState::Normal => return Err(ResolveError::NotAnAlert(reading.id.clone())),
        AlertState::ResolvedAlert => return Err(ResolveError::AlreadyResolved(reading.id.clone())),
        AlertState::UnresolvedAlert => {}
    }

    let requested = total_per_chemical(&request.lines)?;
    let stock = api.fetch_chemicals().await.map_err(ResolveError::Lookup)?;
    let plan = check_stock(&requested, &stock)?;
    info!("Validated {} chemical(s) for resolution", plan.len());

    let mut committed = Vec::new();
    let mut consumed = Vec::with_capacity(plan.len());

    for (chemical, quantity) in &plan {
        let step = Step::DecrementStock(chemical.id.clone());
        let stored = api
            .set_chemical_quantity(chemical, chemical.quantity - quantity)
            .await
            .map_err(|source| abort(step.clone(), &committed, source))?;
        committed.push(step);

        consumed.push(ConsumedChemical {
            chemical_id: chemical.id.clone(),
            name: chemical.name.clone(),
            quantity: *quantity,
            unit: chemical.unit.clone(),
            remaining: stored.quantity,
        });
    }

    for (chemical, quantity) in &plan {
        let step = Step::RecordUsage(chemical.id.clone());
        let entry = UsageEntry {
            chemical_id: chemical.id.clone(),
            quantity: *quantity,
            unit: chemical.unit.clone(),
            adjusted_by: actor.id.clone(),
            pool_id: Some(reading.pool_id.clone()),
            note: usage_note(reading, request.note.as_deref()),
            action: UsageAction::Use,
            reading_id: Some(reading.id.clone()),
        };
        api.append_usage(&entry)
            .await
            .map_err(|source| abort(step.clone(), &committed, source))?;
        committed.push(step);
    }

    let update = ResolveUpdate {
        resolved: true,
        resolved_by: actor.id.clone(),
        note: request.note.clone(),
    };
    api.mark_resolved(&reading.id, &update)
        .await
        .map_err(|source| abort(Step::MarkResolved, &committed, source))?;

    info!("Reading resolved by {}", actor.username);
    Ok(consumed)
}

/// Sum requested quantities per chemical, rejecting malformed lines.
fn total_per_chemical(lines: &[RemediationLine]) -> Result<BTreeMap<Id, f64>, ResolveError> {
    // ---
    if lines.is_empty() {
        return Err(ResolveError::NoRemediation);
    }

    let mut totals = BTreeMap::new();
    for line in lines {
        if !line.quantity.is_finite() || line.quantity <= 0.0 {
            return Err(ResolveError::InvalidQuantity {
                chemical_id: line.chemical_id.clone(),
                quantity: line.quantity,
            });
        }
        *totals.entry(line.chemical_id.clone()).or_insert(0.0) += line.quantity;
    }
    Ok(totals)
}

/// Pair each requested total with its current stock record. Fails on the
/// first chemical that is unknown or short.
fn check_stock<'a>(
    requested: &BTreeMap<Id, f64>,
    stock: &'a [Chemical],
) -> Result<Vec<(&'a Chemical, f64)>, ResolveError> {
    // ---
    let mut plan = Vec::with_capacity(requested.len());
    for (id, &quantity) in requested {
        let chemical = stock
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| ResolveError::UnknownChemical(id.clone()))?;

        if quantity > chemical.quantity {
            return Err(ResolveError::InsufficientStock {
                chemical_id: id.clone(),
                name: chemical.name.clone(),
                requested: quantity,
                available: chemical.quantity,
            });
        }
        plan.push((chemical, quantity));
    }
    Ok(plan)
}

fn usage_note(reading: &WaterQualityReading, note: Option<&str>) -> String {
    match note {
        Some(note) if !note.trim().is_empty() => {
            format!("Xử lý cảnh báo #{}: {}", reading.id, note.trim())
        }
        _ => format!("Xử lý cảnh báo #{}", reading.id),
    }
}

fn abort(step: Step, committed: &[Step], source: ApiError) -> ResolveError {
    // ---
    warn!("Resolution stopped at '{}': {}", step, source);
    ResolveError::Apply {
        step,
        committed: committed.to_vec(),
        source,
    }
}

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Readings with a resolution currently running.
///
/// There is no upstream locking, so two concurrent attempts on one reading
/// could both pass validation and consume stock twice.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: Mutex<HashSet<Id>>,
}

impl InFlight {
    // ---
    /// Claim `id`, or `None` if an attempt is already running for it. The
    /// claim is released when the guard drops.
    pub fn try_claim(self: &Arc<Self>, id: &Id) -> Option<InFlightGuard> {
        // ---
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            registry: Arc::clone(self),
            id: id.clone(),
        })
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlight>,
    id: Id,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry
            .ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}


#[cfg(test)]
mod tests {
    // ---
    use super::fake::{chemical, operator, Call, FakeApi};
    use super::*;
    use chrono::{TimeZone, Utc};
    use tokio_test::{assert_err, assert_ok};

    fn reading(ph: f64, chlorine: f64, resolved: bool) -> WaterQualityReading {
        // ---
        WaterQualityReading {
            id: Id::from("r-42"),
            pool_id: Id::from("p-3"),
            pool_name: None,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            ph,
            chlorine,
            temperature: 28.0,
            note: None,
            resolved,
            resolved_by: None,
            created_by_id: None,
        }
    }

    fn line(id: &str, quantity: f64) -> RemediationLine {
        RemediationLine {
            chemical_id: Id::from(id),
            quantity,
        }
    }

    fn request(lines: Vec<RemediationLine>) -> ResolutionRequest {
        ResolutionRequest { lines, note: None }
    }

    #[test]
    fn test_alert_state_derivation() {
        // ---
        assert_eq!(AlertState::of(WaterStatus::Normal, false), AlertState::Normal);
        assert_eq!(AlertState::of(WaterStatus::Normal, true), AlertState::Normal);
        assert_eq!(
            AlertState::of(WaterStatus::Warning, false),
            AlertState::UnresolvedAlert
        );
        assert_eq!(
            AlertState::of(WaterStatus::Critical, true),
            AlertState::ResolvedAlert
        );
    }

    #[tokio::test]
    async fn test_two_chemicals_produce_two_usages_then_one_resolve() {
        // ---
        let api = FakeApi::with_chemicals(vec![
            chemical("c-1", "Chlorine granules", 20.0),
            chemical("c-2", "pH minus", 8.0),
        ]);
        let req = request(vec![line("c-1", 3.0), line("c-2", 1.5)]);

        let receipt = assert_ok!(resolve(&api, &operator(), &reading(8.5, 2.0, false), &req).await);
        assert_eq!(receipt.consumed.len(), 2);
        assert_eq!(receipt.resolved_by, Id::from("s-7"));

        let calls = api.calls().await;
        let usages: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                Call::Usage(entry) => Some(entry),
                _ => None,
            })
            .collect();
        assert_eq!(usages.len(), 2);
        assert!(usages.iter().all(|u| u.action == UsageAction::Use));
        assert!(usages.iter().all(|u| u.pool_id == Some(Id::from("p-3"))));
        assert!(usages.iter().all(|u| u.reading_id == Some(Id::from("r-42"))));
        assert!(usages.iter().all(|u| u.adjusted_by == Id::from("s-7")));

        let resolves: Vec<_> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, Call::Resolve(..)))
            .collect();
        assert_eq!(resolves.len(), 1);
        assert_eq!(resolves[0].0, calls.len() - 1, "resolve is the last call");

        assert_eq!(api.quantity("c-1").await, 17.0);
        assert_eq!(api.quantity("c-2").await, 6.5);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_without_side_effects() {
        // ---
        let api = FakeApi::with_chemicals(vec![
            chemical("c-1", "Chlorine granules", 20.0),
            chemical("c-2", "pH minus", 5.0),
        ]);
        let req = request(vec![line("c-1", 1.0), line("c-2", 10.0)]);

        let err = assert_err!(resolve(&api, &operator(), &reading(8.5, 2.0, false), &req).await);
        assert!(matches!(
            err,
            ResolveError::InsufficientStock { requested, available, .. }
                if requested == 10.0 && available == 5.0
        ));
        assert!(err.is_validation());
        assert!(api.calls().await.is_empty(), "no mutation on validation failure");
        assert_eq!(api.quantity("c-1").await, 20.0);
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_checked_against_their_total() {
        // ---
        let api = FakeApi::with_chemicals(vec![chemical("c-1", "Chlorine granules", 5.0)]);
        let req = request(vec![line("c-1", 3.0), line("c-1", 3.0)]);

        let err = assert_err!(resolve(&api, &operator(), &reading(6.8, 1.0, false), &req).await);
        assert!(matches!(err, ResolveError::InsufficientStock { requested, .. } if requested == 6.0));
        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_request_validation() {
        // ---
        let api = FakeApi::with_chemicals(vec![chemical("c-1", "Chlorine granules", 5.0)]);
        let alert = reading(6.8, 1.0, false);

        let err = assert_err!(resolve(&api, &operator(), &alert, &request(vec![])).await);
        assert!(matches!(err, ResolveError::NoRemediation));

        let err = assert_err!(resolve(&api, &operator(), &alert, &request(vec![line("c-1", 0.0)])).await);
        assert!(matches!(err, ResolveError::InvalidQuantity { .. }));

        let err = assert_err!(
            resolve(&api, &operator(), &alert, &request(vec![line("c-1", f64::NAN)])).await
        );
        assert!(matches!(err, ResolveError::InvalidQuantity { .. }));

        let err = assert_err!(resolve(&api, &operator(), &alert, &request(vec![line("c-9", 1.0)])).await);
        assert!(matches!(err, ResolveError::UnknownChemical(ref id) if id.as_str() == "c-9"));

        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_normal_and_resolved_readings_cannot_be_resolved() {
        // ---
        let api = FakeApi::with_chemicals(vec![chemical("c-1", "Chlorine granules", 5.0)]);
        let req = request(vec![line("c-1", 1.0)]);

        let err = assert_err!(resolve(&api, &operator(), &reading(7.2, 1.5, false), &req).await);
        assert!(matches!(err, ResolveError::NotAnAlert(_)));
        assert!(err.is_conflict());

        let err = assert_err!(resolve(&api, &operator(), &reading(8.5, 2.0, true), &req).await);
        assert!(matches!(err, ResolveError::AlreadyResolved(_)));

        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_decrement_stops_before_usage_and_resolve() {
        // ---
        let mut api = FakeApi::with_chemicals(vec![
            chemical("c-1", "Chlorine granules", 20.0),
            chemical("c-2", "pH minus", 8.0),
        ]);
        api.fail_decrement_for = Some(Id::from("c-2"));
        let req = request(vec![line("c-1", 3.0), line("c-2", 1.0)]);

        let err = assert_err!(resolve(&api, &operator(), &reading(8.5, 2.0, false), &req).await);
        match err {
            ResolveError::Apply { step, committed, .. } => {
                assert_eq!(step, Step::DecrementStock(Id::from("c-2")));
                assert_eq!(committed, vec![Step::DecrementStock(Id::from("c-1"))]);
            }
            other => panic!("expected Apply error, got {other:?}"),
        }

        let calls = api.calls().await;
        assert_eq!(calls, vec![Call::SetQuantity(Id::from("c-1"), 17.0)]);
        assert!(!calls.iter().any(|c| matches!(c, Call::Usage(_))));
        assert!(!calls.iter().any(|c| matches!(c, Call::Resolve(..))));
        assert_eq!(api.quantity("c-2").await, 8.0);
    }

    #[tokio::test]
    async fn test_failed_usage_write_leaves_reading_unresolved() {
        // ---
        let mut api = FakeApi::with_chemicals(vec![
            chemical("c-1", "Chlorine granules", 20.0),
            chemical("c-2", "pH minus", 8.0),
        ]);
        api.fail_usage_for = Some(Id::from("c-2"));
        let req = request(vec![line("c-1", 3.0), line("c-2", 1.0)]);

        let err = assert_err!(resolve(&api, &operator(), &reading(8.5, 2.0, false), &req).await);
        match err {
            ResolveError::Apply { step, committed, .. } => {
                assert_eq!(step, Step::RecordUsage(Id::from("c-2")));
                assert_eq!(
                    committed,
                    vec![
                        Step::DecrementStock(Id::from("c-1")),
                        Step::DecrementStock(Id::from("c-2")),
                        Step::RecordUsage(Id::from("c-1")),
                    ]
                );
            }
            other => panic!("expected Apply error, got {other:?}"),
        }
        assert!(!api
            .calls()
            .await
            .iter()
            .any(|c| matches!(c, Call::Resolve(..))));
    }

    #[tokio::test]
    async fn test_failed_resolve_update_is_reported() {
        // ---
        let mut api = FakeApi::with_chemicals(vec![chemical("c-1", "Chlorine granules", 20.0)]);
        api.fail_resolve = true;
        let req = request(vec![line("c-1", 2.0)]);

        let err = assert_err!(resolve(&api, &operator(), &reading(6.8, 1.0, false), &req).await);
        assert!(matches!(err, ResolveError::Apply { step: Step::MarkResolved, .. }));
        assert!(err.to_string().contains("record usage of chemical c-1"));
    }

    #[test]
    fn test_usage_note_references_reading() {
        // ---
        let alert = reading(6.8, 1.0, false);
        assert_eq!(usage_note(&alert, None), "Xử lý cảnh báo #r-42");
        assert_eq!(
            usage_note(&alert, Some("  shock dose ")),
            "Xử lý cảnh báo #r-42: shock dose"
        );
    }

    #[test]
    fn test_in_flight_claim_is_exclusive_until_dropped() {
        // ---
        let registry = Arc::new(InFlight::default());
        let id = Id::from("r-1");

        let guard = registry.try_claim(&id).expect("first claim succeeds");
        assert!(registry.try_claim(&id).is_none());
        assert!(registry.try_claim(&Id::from("r-2")).is_some());
        assert!(registry.contains(&id));

        drop(guard);
        assert!(!registry.contains(&id));
        assert!(registry.try_claim(&id).is_some());
    }
}
