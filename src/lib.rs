//! `poolwatch`: backend-for-frontend for the pool water quality dashboard.
//!
//! The service sits between the browser and the remote pool-management REST
//! API. It classifies water quality readings (`thresholds`), runs the alert
//! resolution workflow (`resolution`), computes the fleet summary
//! (`summary`), and proxies plain CRUD for pools, staff and chemicals.
//!
//! Module boundaries: handlers live under `routes` and only talk to the
//! upstream through `api`; the workflows only see the [`api::PoolApi`] trait.

pub mod api;
pub mod config;
pub mod inventory;
pub mod models;
pub mod resolution;
pub mod routes;
pub mod session;
pub mod summary;
pub mod thresholds;

pub use config::Config;
pub use routes::AppState;
