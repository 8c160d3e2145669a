//! Middleware: bearer authentication, role guards, security headers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::{DateTime, TimeZone, Utc};
use rxdesk_common::{auth::validate_token, error::RxError, models::user::Role};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::AppState;

/// Authentication context extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Owner of the resource, or any staff member.
    pub fn can_access(&self, owner: Option<Uuid>) -> bool {
        self.is_staff() || owner == Some(self.user_id)
    }
}

/// Decode the bearer token on a request, if any.
///
/// `Ok(None)` means no Authorization header; a present but invalid token is
/// an error.
fn authenticate(state: &AppState, request: &Request) -> Result<Option<AuthContext>, RxError> {
    let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>() else {
        return Ok(None);
    };

    let claims = validate_token(bearer.token(), state.config.auth.jwt_secret.expose_secret())
        .map_err(|_| RxError::InvalidToken)?;

    // Ensure it's an access token, not a refresh token
    if !claims.is_access() {
        return Err(RxError::InvalidToken);
    }

    let user_id = claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| RxError::InvalidToken)?;
    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .ok_or(RxError::InvalidToken)?;

    Ok(Some(AuthContext {
        user_id,
        email: claims.email,
        role: claims.role,
        expires_at,
    }))
}

/// Require a valid access token; inserts [`AuthContext`] for handlers.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, RxError> {
    let auth_ctx = authenticate(&state, &request)?.ok_or(RxError::Unauthorized)?;
    request.extensions_mut().insert(auth_ctx);
    Ok(next.run(request).await)
}

/// Like [`require_auth`] but lets anonymous requests through. Handlers take
/// `Option<Extension<AuthContext>>`.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, RxError> {
    if let Some(auth_ctx) = authenticate(&state, &request)? {
        request.extensions_mut().insert(auth_ctx);
    }
    Ok(next.run(request).await)
}

/// Pharmacist or admin. Layer inside `require_auth`.
pub async fn require_staff(
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, RxError> {
    if !auth.role.is_staff() {
        return Err(RxError::Forbidden);
    }
    Ok(next.run(request).await)
}

/// Admin only. Layer inside `require_auth`.
pub async fn require_admin(
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, RxError> {
    if !auth.role.is_admin() {
        return Err(RxError::Forbidden);
    }
    Ok(next.run(request).await)
}

// ── Security headers ──────────────────────────────────────────────────────────

/// Add security headers to every HTTP response.
///
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options: DENY`
/// - `Referrer-Policy: strict-origin-when-cross-origin`
/// - `Strict-Transport-Security` (2 years)
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let h = response.headers_mut();

    macro_rules! set {
        ($name:expr, $val:expr) => {
            if let Ok(v) = $val.parse::<axum::http::HeaderValue>() {
                h.insert($name, v);
            }
        };
    }

    set!(
        axum::http::header::HeaderName::from_static("x-content-type-options"),
        "nosniff"
    );
    set!(
        axum::http::header::HeaderName::from_static("x-frame-options"),
        "DENY"
    );
    set!(
        axum::http::header::HeaderName::from_static("referrer-policy"),
        "strict-origin-when-cross-origin"
    );
    set!(
        axum::http::header::HeaderName::from_static("strict-transport-security"),
        "max-age=63072000; includeSubDomains"
    );

    response
}
