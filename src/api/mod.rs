//! Remote pool-management API boundary.
//!
//! Everything the service knows about pools, staff, chemicals and readings
//! comes from the upstream REST API. This module owns the HTTP client
//! (`client.rs`), the typed error returned by every upstream call, and the
//! [`PoolApi`] seam the resolution workflow and summary are written against.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::models::{
    Chemical, Id, Pool, ReadingFilter, ResolveUpdate, Staff, UsageEntry, WaterQualityReading,
};

mod client;

pub use client::{ApiClient, SessionClient};

// ---

/// Failure talking to the upstream API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned HTTP {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("unexpected payload from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    // ---
    /// HTTP status returned upstream, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// An upstream collection with plain CRUD semantics.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Upstream collection path, e.g. `/Pools`.
    const PATH: &'static str;

    /// Collection name on this service's own HTTP surface.
    const ROUTE: &'static str;

    fn id(&self) -> &Id;
}

impl Resource for Pool {
    const PATH: &'static str = "/Pools";
    const ROUTE: &'static str = "pools";

    fn id(&self) -> &Id {
        &self.id
    }
}

impl Resource for Staff {
    const PATH: &'static str = "/Staff";
    const ROUTE: &'static str = "staff";

    fn id(&self) -> &Id {
        &self.id
    }
}

impl Resource for Chemical {
    const PATH: &'static str = "/chemicals";
    const ROUTE: &'static str = "chemicals";

    fn id(&self) -> &Id {
        &self.id
    }
}

/// Upstream operations used by the workflows, bound to one authenticated
/// session.
#[async_trait]
pub trait PoolApi: Send + Sync {
    async fn fetch_readings(
        &self,
        filter: &ReadingFilter,
    ) -> Result<Vec<WaterQualityReading>, ApiError>;

    async fn fetch_reading(&self, id: &Id) -> Result<WaterQualityReading, ApiError>;

    async fn fetch_pools(&self) -> Result<Vec<Pool>, ApiError>;

    async fn fetch_chemicals(&self) -> Result<Vec<Chemical>, ApiError>;

    async fn fetch_chemical(&self, id: &Id) -> Result<Chemical, ApiError>;

    /// Overwrite a chemical's stock level, returning the stored record.
    async fn set_chemical_quantity(
        &self,
        chemical: &Chemical,
        quantity: f64,
    ) -> Result<Chemical, ApiError>;

    async fn append_usage(&self, entry: &UsageEntry) -> Result<(), ApiError>;

    async fn mark_resolved(&self, id: &Id, update: &ResolveUpdate) -> Result<(), ApiError>;
}
