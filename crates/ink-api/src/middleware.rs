use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;
use uuid::Uuid;

use ink_types::api::Claims;
use ink_types::models::ActorContext;

use crate::auth::SESSION_COOKIE;
use crate::error::{ApiError, ApiResult};
use crate::{AppState, db_call};

/// The actor of a request, if it carries a live session. Inserted for every
/// request; public handlers use it for viewer-relative flags.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<ActorContext>);

impl Viewer {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|a| a.user_id)
    }
}

/// Resolve the session token from the `Authorization: Bearer` header or the
/// session cookie, and attach the resulting `Viewer`.
pub async fn resolve_actor(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let actor = match session_token(req.headers(), &jar) {
        Some(token) => actor_for_token(&state, &token).await?,
        None => None,
    };

    req.extensions_mut().insert(Viewer(actor));
    Ok(next.run(req).await)
}

/// Reject requests without a live session; otherwise expose the `ActorContext`.
pub async fn require_auth(mut req: Request, next: Next) -> ApiResult<Response> {
    let actor = req
        .extensions()
        .get::<Viewer>()
        .and_then(|v| v.0.clone())
        .ok_or_else(|| ApiError::Unauthenticated("Authentication required".into()))?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Reject non-admin actors. The role comes from the user row joined at session
/// lookup, so a demoted admin loses access immediately.
pub async fn require_admin(req: Request, next: Next) -> ApiResult<Response> {
    let is_admin = req
        .extensions()
        .get::<ActorContext>()
        .is_some_and(ActorContext::is_admin);

    if !is_admin {
        return Err(ApiError::Forbidden("Admin access required".into()));
    }
    Ok(next.run(req).await)
}

fn session_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
}

/// Decode a token and look up its session. Invalid, expired and revoked
/// tokens resolve to `None`.
async fn actor_for_token(state: &AppState, token: &str) -> ApiResult<Option<ActorContext>> {
    let claims = match decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            debug!("Rejected session token: {}", e);
            return Ok(None);
        }
    };

    let session = db_call(state, move |db| db.find_session(claims.sid, Utc::now())).await?;

    Ok(session
        .filter(|s| s.user_id == claims.sub)
        .map(|s| ActorContext {
            user_id: s.user_id,
            artist_name: s.artist_name,
            role: s.role,
            session_id: s.session_id,
        }))
}
