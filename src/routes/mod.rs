//! HTTP gateway.
//!
//! Each sibling module exports a subrouter; this gateway merges them and
//! attaches the shared [`AppState`], so `main.rs` never sees individual
//! endpoints.

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, Router};

use crate::api::{ApiClient, ApiError};
use crate::models::{Chemical, Pool, Staff};
use crate::resolution::InFlight;
use crate::session::SessionStore;
use crate::Config;

mod auth;
mod error;
mod health;
mod inventory;
mod readings;
mod resources;
mod summary;

pub use auth::{AdminSession, CurrentSession};
pub use error::AppError;

// ---

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub sessions: Arc<SessionStore>,
    pub in_flight: Arc<InFlight>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        // ---
        let api = ApiClient::new(&config.api_url, config.api_timeout)?;
        Ok(AppState {
            api,
            sessions: Arc::new(SessionStore::new(config.session_ttl)),
            in_flight: Arc::new(InFlight::default()),
            config,
        })
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(readings::router())
        .merge(summary::router())
        .merge(resources::router::<Pool>())
        .merge(resources::router::<Staff>())
        .merge(resources::router::<Chemical>())
        .merge(inventory::router())
        .layer(from_fn_with_state(state.clone(), auth::drop_rejected_sessions))
        .with_state(state)
}
