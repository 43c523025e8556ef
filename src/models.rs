//! Wire model for the remote pool-management API.
//!
//! Every type here mirrors one JSON shape exchanged with the upstream API
//! (camelCase field names). Decoding is strict: a payload that does not match
//! these shapes is a decode error at the API boundary, not an empty list.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---

/// Entity identifier as issued by the upstream API.
///
/// Upstream ids arrive as either JSON strings or integers depending on the
/// collection, so both decode into the same string-backed value. An empty id
/// means "not yet assigned" and is omitted when serializing a new entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    // ---
    pub fn new(value: impl Into<String>) -> Self {
        Id(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Id(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // ---
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Id(s),
            RawId::Signed(n) => Id(n.to_string()),
            RawId::Unsigned(n) => Id(n.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Pools and staff
// ---------------------------------------------------------------------------

/// Operating status of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Active,
    Maintenance,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    #[serde(default, skip_serializing_if = "Id::is_empty")]
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    pub status: PoolStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    #[serde(default, skip_serializing_if = "Id::is_empty")]
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Chemical inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chemical {
    #[serde(default, skip_serializing_if = "Id::is_empty")]
    pub id: Id,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub min_threshold: f64,
    #[serde(default)]
    pub reorder_level: f64,
}

impl Chemical {
    // ---
    /// Stock has fallen to or below the reorder level.
    pub fn needs_reorder(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    /// Stock is strictly below the minimum the site must keep on hand.
    pub fn below_minimum(&self) -> bool {
        self.quantity < self.min_threshold
    }
}

/// Direction of a stock movement recorded in the usage history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageAction {
    /// Stock consumed treating a pool.
    #[serde(rename = "Sử dụng")]
    Use,
    /// Stock added by a resupply.
    #[serde(rename = "Nạp thêm")]
    Restock,
}

/// One append-only record in `/chemicalUsageHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEntry {
    pub chemical_id: Id,
    pub quantity: f64,
    pub unit: String,
    pub adjusted_by: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<Id>,
    #[serde(default)]
    pub note: String,
    pub action: UsageAction,
    #[serde(
        default,
        rename = "waterQualityParameterId",
        skip_serializing_if = "Option::is_none"
    )]
    pub reading_id: Option<Id>,
}

// ---------------------------------------------------------------------------
// Water quality readings
// ---------------------------------------------------------------------------

/// Raw reading as stored upstream. Status and needs-action are never stored;
/// see [`WaterQualityReading::evaluate`](crate::thresholds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterQualityReading {
    pub id: Id,
    pub pool_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "pH")]
    pub ph: f64,
    pub chlorine: f64,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_id: Option<Id>,
}

/// Query filters accepted by `GET /WaterQualityParameters`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_id: Option<String>,
}

/// Body of `PATCH /WaterQualityParameters/{id}/resolve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveUpdate {
    pub resolved: bool,
    pub resolved_by: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Authenticated user profile returned by `/auth/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub user: User,
}
