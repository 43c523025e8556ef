//! CRUD passthrough for plain upstream collections.
//!
//! One generic subrouter per [`Resource`]: any session may read, only an
//! admin may create, update or delete.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;

use super::{AdminSession, AppError, AppState, CurrentSession};
use crate::api::Resource;
use crate::models::Id;

// ---

pub fn router<R: Resource>() -> Router<AppState> {
    // ---
    Router::new()
        .route(&format!("/{}", R::ROUTE), get(list::<R>).post(create::<R>))
        .route(
            &format!("/{}/{{id}}", R::ROUTE),
            get(fetch::<R>).put(update::<R>).delete(remove::<R>),
        )
}

async fn list<R: Resource>(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<R>>, AppError> {
    // ---
    let items = session.client(&state).list::<R>().await?;
    info!("GET /{} - {} item(s)", R::ROUTE, items.len());
    Ok(Json(items))
}

async fn fetch<R: Resource>(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<R>, AppError> {
    // ---
    let item = session.client(&state).get::<R>(&Id(id)).await?;
    Ok(Json(item))
}

async fn create<R: Resource>(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Json(item): Json<R>,
) -> Result<(StatusCode, Json<R>), AppError> {
    // ---
    let created = session.client(&state).create(&item).await?;
    info!(
        "POST /{} - created {} by {}",
        R::ROUTE,
        created.id(),
        session.user().username
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update<R: Resource>(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(item): Json<R>,
) -> Result<Json<R>, AppError> {
    // ---
    let id = Id(id);
    if !item.id().is_empty() && item.id() != &id {
        return Err(AppError::BadRequest(format!(
            "body id {} does not match path id {}",
            item.id(),
            id
        )));
    }

    let updated = session.client(&state).update(&id, &item).await?;
    info!("PUT /{}/{} by {}", R::ROUTE, id, session.user().username);
    Ok(Json(updated))
}

async fn remove<R: Resource>(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    // ---
    let id = Id(id);
    session.client(&state).delete::<R>(&id).await?;
    info!("DELETE /{}/{} by {}", R::ROUTE, id, session.user().username);
    Ok(StatusCode::NO_CONTENT)
}
