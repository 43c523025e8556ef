//! Error type shared by every handler, mapped to an HTTP status and a JSON
//! `{ "error": ... }` body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::api::ApiError;
use crate::inventory::RestockError;
use crate::resolution::ResolveError;
use crate::thresholds::ReadingError;

// ---

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing or unknown session")]
    Unauthenticated,

    #[error("this action requires an administrator")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Reading(#[from] ReadingError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Restock(#[from] RestockError),
}

/// Status for an upstream failure. Not-found and expired-token answers pass
/// through; anything else is the upstream's fault.
fn upstream_status(err: &ApiError) -> StatusCode {
    match err.status() {
        Some(404) => StatusCode::NOT_FOUND,
        Some(401) => StatusCode::UNAUTHORIZED,
        Some(403) => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl AppError {
    // ---
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Api(e) => upstream_status(e),
            AppError::Reading(_) => StatusCode::BAD_GATEWAY,
            AppError::Resolve(e) if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Resolve(e) if e.is_conflict() => StatusCode::CONFLICT,
            AppError::Resolve(ResolveError::Lookup(e)) => upstream_status(e),
            AppError::Resolve(ResolveError::Apply { source, .. }) => upstream_status(source),
            AppError::Resolve(_) => StatusCode::BAD_GATEWAY,
            AppError::Restock(RestockError::InvalidQuantity(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Restock(RestockError::Api(e)) => upstream_status(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }

        let body = match &self {
            AppError::Resolve(ResolveError::Apply { committed, .. }) => json!({
                "error": self.to_string(),
                "committed": committed,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Id;
    use crate::resolution::Step;

    fn upstream(status: u16) -> ApiError {
        ApiError::Status {
            path: "/Pools".to_string(),
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_validation_and_conflict_statuses() {
        // ---
        let short = AppError::from(ResolveError::InsufficientStock {
            chemical_id: Id::from("c-1"),
            name: "Chlorine".to_string(),
            requested: 10.0,
            available: 5.0,
        });
        assert_eq!(short.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let busy = AppError::from(ResolveError::InFlight(Id::from("r-1")));
        assert_eq!(busy.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_upstream_statuses() {
        // ---
        assert_eq!(AppError::from(upstream(404)).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(upstream(401)).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(upstream(500)).status(), StatusCode::BAD_GATEWAY);

        let apply = AppError::from(ResolveError::Apply {
            step: Step::MarkResolved,
            committed: vec![],
            source: upstream(503),
        });
        assert_eq!(apply.status(), StatusCode::BAD_GATEWAY);
    }
}
