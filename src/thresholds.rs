//! Water quality threshold evaluation.
//!
//! Classifies a reading as normal, warning or critical from its pH and
//! chlorine values against one fixed [`ThresholdTable`]. Evaluation is pure:
//! the same measurements always give the same status, whatever the reading's
//! resolution state.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::models::WaterQualityReading;

// ---

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    // ---
    pub const fn new(min: f64, max: f64) -> Self {
        Range { min, max }
    }

    /// Boundary values count as inside.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// `true` if `other` lies entirely within `self`.
    pub fn encloses(&self, other: &Range) -> bool {
        self.min <= other.min && self.max >= other.max
    }
}

/// Classification of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterStatus {
    Normal,
    Warning,
    Critical,
}

impl fmt::Display for WaterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaterStatus::Normal => write!(f, "normal"),
            WaterStatus::Warning => write!(f, "warning"),
            WaterStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Acceptable and critical bounds for each measured parameter.
///
/// A value outside its critical range makes the reading critical; a value
/// inside the critical range but outside the acceptable one makes it a
/// warning. Temperature is informational only and never drives the status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdTable {
    pub ph_acceptable: Range,
    pub ph_critical: Range,
    pub chlorine_acceptable: Range,
    pub chlorine_critical: Range,
    pub temperature_acceptable: Range,
}

impl ThresholdTable {
    // ---
    /// The canonical table used everywhere in the service.
    pub const STANDARD: ThresholdTable = ThresholdTable {
        ph_acceptable: Range::new(7.0, 7.6),
        ph_critical: Range::new(6.5, 8.0),
        chlorine_acceptable: Range::new(0.5, 3.0),
        chlorine_critical: Range::new(0.2, 5.0),
        temperature_acceptable: Range::new(26.0, 32.0),
    };

    /// Critical bounds must enclose the acceptable ones.
    pub fn is_consistent(&self) -> bool {
        self.ph_critical.encloses(&self.ph_acceptable)
            && self.chlorine_critical.encloses(&self.chlorine_acceptable)
    }

    /// Classify a pH / chlorine pair. Inputs must be finite.
    pub fn classify(&self, ph: f64, chlorine: f64) -> WaterStatus {
        // ---
        if !self.ph_critical.contains(ph) || !self.chlorine_critical.contains(chlorine) {
            WaterStatus::Critical
        } else if !self.ph_acceptable.contains(ph) || !self.chlorine_acceptable.contains(chlorine)
        {
            WaterStatus::Warning
        } else {
            WaterStatus::Normal
        }
    }
}

/// Classify against [`ThresholdTable::STANDARD`].
pub fn evaluate(ph: f64, chlorine: f64) -> WaterStatus {
    ThresholdTable::STANDARD.classify(ph, chlorine)
}

/// A reading needs operator attention when it is out of range and nobody has
/// resolved it yet.
pub fn needs_action(status: WaterStatus, resolved: bool) -> bool {
    status != WaterStatus::Normal && !resolved
}

// ---------------------------------------------------------------------------
// Reading evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReadingError {
    #[error("reading {reading}: {field} is not a finite number ({value})")]
    NonFinite {
        reading: String,
        field: &'static str,
        value: f64,
    },
}

/// A reading together with its derived classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedReading {
    #[serde(flatten)]
    pub reading: WaterQualityReading,
    pub status: WaterStatus,
    pub needs_action: bool,
    pub temperature_in_range: bool,
}

impl WaterQualityReading {
    // ---
    /// Reject measurements that cannot be classified.
    pub fn validate(&self) -> Result<(), ReadingError> {
        // ---
        for (field, value) in [
            ("pH", self.ph),
            ("chlorine", self.chlorine),
            ("temperature", self.temperature),
        ] {
            if !value.is_finite() {
                return Err(ReadingError::NonFinite {
                    reading: self.id.to_string(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Status of this reading against the standard table.
    pub fn status(&self) -> Result<WaterStatus, ReadingError> {
        self.validate()?;
        Ok(evaluate(self.ph, self.chlorine))
    }

    pub fn evaluate(self) -> Result<EvaluatedReading, ReadingError> {
        // ---
        let status = self.status()?;
        let temperature_in_range = ThresholdTable::STANDARD
            .temperature_acceptable
            .contains(self.temperature);

        Ok(EvaluatedReading {
            needs_action: needs_action(status, self.resolved),
            status,
            temperature_in_range,
            reading: self,
        })
    }
}
