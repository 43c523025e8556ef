//! Login, logout and the session extractors.
//!
//! The browser receives an opaque session id at login and sends it back as
//! `Authorization: Bearer <session-id>`. The upstream bearer token never
//! leaves this service.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AppError, AppState};
use crate::api::SessionClient;
use crate::models::{LoginRequest, User};
use crate::session::Session;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginReply {
    session_id: Uuid,
    user: User,
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginRequest>,
) -> Result<Json<LoginReply>, AppError> {
    // ---
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        return Err(AppError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    info!("POST /auth/login - {}", credentials.username);
    let response = state.api.login(&credentials).await?;
    let session = state.sessions.login(response.token, response.user).await;

    Ok(Json(LoginReply {
        session_id: session.id,
        user: session.user.clone(),
    }))
}

async fn logout(session: CurrentSession, State(state): State<AppState>) -> StatusCode {
    state.sessions.logout(&session.0.id).await;
    StatusCode::NO_CONTENT
}

async fn me(session: CurrentSession) -> Json<User> {
    Json(session.0.user.clone())
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// The caller's session. Rejects with 401 when absent or unknown.
pub struct CurrentSession(pub Arc<Session>);

impl CurrentSession {
    /// Upstream client acting with this session's credentials.
    pub fn client(&self, state: &AppState) -> SessionClient {
        state.api.session(&self.0.token)
    }

    pub fn user(&self) -> &User {
        &self.0.user
    }
}

fn bearer_session_id(headers: &HeaderMap) -> Option<Uuid> {
    // ---
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Uuid::parse_str(token.trim()).ok()
}

/// Forget the caller's session once the upstream API refuses its token, so
/// the next request is asked to log in again.
pub(super) async fn drop_rejected_sessions(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // ---
    let session_id = bearer_session_id(request.headers());
    let response = next.run(request).await;

    if response.status() == StatusCode::UNAUTHORIZED {
        if let Some(id) = session_id {
            if state.sessions.logout(&id).await {
                warn!("Upstream rejected the token of session {}; session dropped", id);
            }
        }
    }
    response
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        // ---
        let id = bearer_session_id(&parts.headers).ok_or(AppError::Unauthenticated)?;
        state
            .sessions
            .get(&id)
            .await
            .map(CurrentSession)
            .ok_or(AppError::Unauthenticated)
    }
}

/// A session whose user has the admin role. Rejects with 403 otherwise.
pub struct AdminSession(pub CurrentSession);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        // ---
        let session = CurrentSession::from_request_parts(parts, state).await?;
        if !session.user().is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(AdminSession(session))
    }
}
