//! Fleet-level dashboard counters.
//!
//! A read-only fold over the current pool, reading and chemical collections.
//! Nothing here is stored; every call recomputes from what was just fetched.
//!
//! # Clock injection
//! `summarize` takes `now` and the local offset instead of reading the clock,
//! so "today" is deterministic in tests.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::models::{Chemical, Id, Pool, PoolStatus, WaterQualityReading};
use crate::thresholds::{evaluate, needs_action, WaterStatus};

// ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    pub active_pools: usize,
    pub maintenance_pools: usize,
    pub closed_pools: usize,
    pub today_measurements: usize,
    /// Pools whose latest reading is out of range.
    pub total_alerts: usize,
    pub critical_alerts: usize,
    pub warning_alerts: usize,
    /// Readings of any age still needing action.
    pub unresolved_alerts: usize,
    pub low_stock_chemicals: usize,
    /// Chemicals under the minimum the site must keep on hand.
    pub below_minimum_chemicals: usize,
}

/// Most recent reading for each pool. Ties keep the first one seen.
pub fn latest_per_pool(readings: &[WaterQualityReading]) -> HashMap<&Id, &WaterQualityReading> {
    // ---
    let mut latest: HashMap<&Id, &WaterQualityReading> = HashMap::new();
    for reading in readings {
        let newer = latest
            .get(&reading.pool_id)
            .map_or(true, |current| reading.timestamp > current.timestamp);
        if newer {
            latest.insert(&reading.pool_id, reading);
        }
    }
    latest
}

/// Build the dashboard counters.
///
/// Readings with non-finite measurements cannot be classified and are left
/// out of every alert count.
pub fn summarize(
    pools: &[Pool],
    readings: &[WaterQualityReading],
    chemicals: &[Chemical],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> FleetSummary {
    // ---
    let mut summary = FleetSummary::default();

    for pool in pools {
        match pool.status {
            PoolStatus::Active => summary.active_pools += 1,
            PoolStatus::Maintenance => summary.maintenance_pools += 1,
            PoolStatus::Closed => summary.closed_pools += 1,
        }
    }

    let today = now.with_timezone(&offset).date_naive();
    summary.today_measurements = readings
        .iter()
        .filter(|r| r.timestamp.with_timezone(&offset).date_naive() == today)
        .count();

    for reading in latest_per_pool(readings).values() {
        match reading.status() {
            Ok(WaterStatus::Critical) => summary.critical_alerts += 1,
            Ok(WaterStatus::Warning) => summary.warning_alerts += 1,
            Ok(WaterStatus::Normal) | Err(_) => {}
        }
    }
    summary.total_alerts = summary.critical_alerts + summary.warning_alerts;

    summary.unresolved_alerts = readings
        .iter()
        .filter(|r| r.validate().is_ok())
        .filter(|r| needs_action(evaluate(r.ph, r.chlorine), r.resolved))
        .count();

    summary.low_stock_chemicals = chemicals.iter().filter(|c| c.needs_reorder()).count();
    summary.below_minimum_chemicals = chemicals.iter().filter(|c| c.below_minimum()).count();

    summary
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn pool(id: &str, status: PoolStatus) -> Pool {
        Pool {
            id: Id::from(id),
            name: format!("Pool {id}"),
            location: None,
            capacity: None,
            status,
        }
    }

    fn reading(
        id: &str,
        pool: &str,
        at: DateTime<Utc>,
        ph: f64,
        chlorine: f64,
        resolved: bool,
    ) -> WaterQualityReading {
        // ---
        WaterQualityReading {
            id: Id::from(id),
            pool_id: Id::from(pool),
            pool_name: None,
            timestamp: at,
            ph,
            chlorine,
            temperature: 28.0,
            note: None,
            resolved,
            resolved_by: None,
            created_by_id: None,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_pool_status_counts() {
        // ---
        let pools = vec![
            pool("1", PoolStatus::Active),
            pool("2", PoolStatus::Maintenance),
            pool("3", PoolStatus::Active),
        ];
        let summary = summarize(&pools, &[], &[], at(10, 12), utc());
        assert_eq!(summary.active_pools, 2);
        assert_eq!(summary.maintenance_pools, 1);
        assert_eq!(summary.closed_pools, 0);
    }

    #[test]
    fn test_latest_reading_wins_per_pool() {
        // ---
        let readings = vec![
            reading("a", "1", at(9, 8), 8.5, 1.0, false),
            reading("b", "1", at(10, 8), 7.2, 1.0, false),
            reading("c", "2", at(10, 7), 7.2, 1.0, false),
            reading("d", "2", at(9, 7), 6.8, 1.0, false),
        ];
        let latest = latest_per_pool(&readings);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[&Id::from("1")].id, Id::from("b"));
        assert_eq!(latest[&Id::from("2")].id, Id::from("c"));
    }

    #[test]
    fn test_alert_counts_use_latest_reading_only() {
        // ---
        let readings = vec![
            // pool 1 recovered; older critical still unresolved
            reading("a", "1", at(9, 8), 8.5, 1.0, false),
            reading("b", "1", at(10, 8), 7.2, 1.0, false),
            // pool 2 currently critical (chlorine)
            reading("c", "2", at(10, 9), 7.2, 6.0, false),
            // pool 3 currently warning but already resolved
            reading("d", "3", at(10, 9), 6.8, 1.0, true),
        ];
        let summary = summarize(&[], &readings, &[], at(10, 12), utc());

        assert_eq!(summary.critical_alerts, 1);
        assert_eq!(summary.warning_alerts, 1);
        assert_eq!(summary.total_alerts, 2);
        assert_eq!(summary.unresolved_alerts, 2, "readings a and c need action");
    }

    #[test]
    fn test_today_respects_local_offset() {
        // ---
        // 2025-06-09 18:00 UTC is already 2025-06-10 01:00 at UTC+7.
        let readings = vec![
            reading("a", "1", at(9, 18), 7.2, 1.0, false),
            reading("b", "1", at(10, 3), 7.2, 1.0, false),
            reading("c", "1", at(8, 12), 7.2, 1.0, false),
        ];
        let now = at(10, 4);

        let local = summarize(&[], &readings, &[], now, FixedOffset::east_opt(7 * 3600).unwrap());
        assert_eq!(local.today_measurements, 2);

        let in_utc = summarize(&[], &readings, &[], now, utc());
        assert_eq!(in_utc.today_measurements, 1);
    }

    #[test]
    fn test_unclassifiable_readings_are_skipped() {
        // ---
        let readings = vec![reading("a", "1", at(10, 8), f64::NAN, 1.0, false)];
        let summary = summarize(&[], &readings, &[], at(10, 12), utc());
        assert_eq!(summary.total_alerts, 0);
        assert_eq!(summary.unresolved_alerts, 0);
        assert_eq!(summary.today_measurements, 1);
    }

    #[test]
    fn test_low_stock_and_below_minimum_counts() {
        // ---
        let chemicals = vec![
            Chemical {
                id: Id::from("c-1"),
                name: "Chlorine".to_string(),
                kind: "disinfectant".to_string(),
                quantity: 3.0,
                unit: "kg".to_string(),
                min_threshold: 2.0,
                reorder_level: 5.0,
            },
            Chemical {
                id: Id::from("c-2"),
                name: "Soda ash".to_string(),
                kind: "ph-up".to_string(),
                quantity: 30.0,
                unit: "kg".to_string(),
                min_threshold: 2.0,
                reorder_level: 5.0,
            },
            Chemical {
                id: Id::from("c-3"),
                name: "Sodium bisulfate".to_string(),
                kind: "ph-down".to_string(),
                quantity: 1.5,
                unit: "kg".to_string(),
                min_threshold: 2.0,
                reorder_level: 5.0,
            },
        ];
        let summary = summarize(&[], &[], &chemicals, at(10, 12), utc());
        assert_eq!(summary.low_stock_chemicals, 2);
        assert_eq!(summary.below_minimum_chemicals, 1, "only c-3 is under its minimum");
    }
}
