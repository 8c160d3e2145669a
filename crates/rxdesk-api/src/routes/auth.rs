//! Authentication routes: register, login, refresh, profile, session check.
//!
//! Tokens are stateless; logout only tells the client to drop them.

use axum::{
    extract::{Extension, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rxdesk_common::{
    auth::validate_token,
    error::{RxError, RxResult},
    ids,
    models::user::{
        ChangePasswordRequest, LoginRequest, RegisterRequest, Role, UpdateProfileRequest, User,
        UserResponse,
    },
    validation::validate_request,
};
use rxdesk_db::{
    postgres::is_unique_violation,
    repository::users::{self, NewUser},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{with_auth, Ack};
use crate::{
    auth::{self, TokenPair},
    extract::JsonBody,
    middleware::AuthContext,
    AppState,
};

/// Auth router.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token));

    let authenticated = Router::new()
        .route("/auth/me", get(get_me).put(update_me))
        .route("/auth/password", put(change_password))
        .route("/auth/verify", get(verify_session))
        .route("/auth/logout", post(logout));

    public.merge(with_auth(&state, authenticated))
}

#[derive(Serialize)]
struct AuthResponse {
    user: UserResponse,
    #[serde(flatten)]
    tokens: TokenPair,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct VerifyResponse {
    valid: bool,
    user: UserResponse,
    role: Role,
    expires_at: DateTime<Utc>,
}

fn issue_tokens(state: &AppState, user: &User) -> RxResult<TokenPair> {
    let cfg = &state.config.auth;
    auth::generate_token_pair(
        user.id,
        &user.email,
        user.role,
        cfg.jwt_secret.expose_secret(),
        cfg.access_token_ttl_secs,
        cfg.refresh_token_ttl_secs,
    )
    .map_err(|e| RxError::Internal(e.into()))
}

async fn load_user(state: &AppState, user_id: uuid::Uuid) -> RxResult<User> {
    users::find_by_id(&state.db.pg, user_id)
        .await?
        .ok_or_else(|| RxError::not_found("User"))
}

/// POST /api/auth/register
///
/// Create a customer account. Returns user profile + JWT tokens.
async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> RxResult<Json<AuthResponse>> {
    validate_request(&body)?;

    // Check email availability
    if users::find_by_email(&state.db.pg, &body.email).await?.is_some() {
        return Err(RxError::AlreadyExists {
            resource: "Email".into(),
        });
    }

    // Hash password with Argon2id
    let password_hash =
        auth::hash_password(&body.password).map_err(|e| RxError::Internal(anyhow::anyhow!("{e}")))?;

    let user = users::create_user(
        &state.db.pg,
        ids::generate_id(),
        NewUser {
            email: body.email.trim(),
            password_hash: &password_hash,
            first_name: body.first_name.trim(),
            last_name: body.last_name.trim(),
            phone: body.phone.as_deref(),
            date_of_birth: body.date_of_birth,
            role: Role::Customer,
        },
    )
    .await
    .map_err(|e| {
        // Lost a race with a concurrent registration
        if is_unique_violation(&e) {
            RxError::AlreadyExists {
                resource: "Email".into(),
            }
        } else {
            e.into()
        }
    })?;

    let tokens = issue_tokens(&state, &user)?;

    tracing::info!(user_id = %user.id, "New user registered");

    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

/// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> RxResult<Json<AuthResponse>> {
    validate_request(&body)?;

    let user = users::find_by_email(&state.db.pg, &body.email)
        .await?
        .ok_or(RxError::InvalidCredentials)?;

    let valid = auth::verify_password(&body.password, &user.password_hash)
        .map_err(|_| RxError::InvalidCredentials)?;
    if !valid {
        return Err(RxError::InvalidCredentials);
    }

    if !user.is_active {
        return Err(RxError::AccountDisabled);
    }

    users::touch_last_login(&state.db.pg, user.id).await?;
    let tokens = issue_tokens(&state, &user)?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User logged in");

    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

/// POST /api/auth/refresh
///
/// Exchange a refresh token for a new token pair.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> RxResult<Json<TokenPair>> {
    let claims = validate_token(
        &body.refresh_token,
        state.config.auth.jwt_secret.expose_secret(),
    )
    .map_err(|_| RxError::InvalidToken)?;

    if !claims.is_refresh() {
        return Err(RxError::InvalidToken);
    }

    let user_id: uuid::Uuid = claims.sub.parse().map_err(|_| RxError::InvalidToken)?;

    // Role changes and deactivation take effect on the next refresh
    let user = users::find_by_id(&state.db.pg, user_id)
        .await?
        .ok_or(RxError::InvalidToken)?;
    if !user.is_active {
        return Err(RxError::AccountDisabled);
    }

    Ok(Json(issue_tokens(&state, &user)?))
}

/// GET /api/auth/me
async fn get_me(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<UserResponse>> {
    Ok(Json(load_user(&state, auth.user_id).await?.into()))
}

/// PUT /api/auth/me
async fn update_me(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<UpdateProfileRequest>,
) -> RxResult<Json<UserResponse>> {
    validate_request(&body)?;
    load_user(&state, auth.user_id).await?;

    let user = users::update_profile(
        &state.db.pg,
        auth.user_id,
        body.first_name.as_deref().map(str::trim),
        body.last_name.as_deref().map(str::trim),
        body.phone.as_deref(),
        body.date_of_birth,
        body.address.as_deref(),
    )
    .await?;

    Ok(Json(user.into()))
}

/// PUT /api/auth/password
async fn change_password(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> RxResult<Json<Ack>> {
    validate_request(&body)?;
    let user = load_user(&state, auth.user_id).await?;

    let valid = auth::verify_password(&body.current_password, &user.password_hash)
        .map_err(|e| RxError::Internal(anyhow::anyhow!("{e}")))?;
    if !valid {
        return Err(RxError::validation("Current password is incorrect"));
    }

    let password_hash = auth::hash_password(&body.new_password)
        .map_err(|e| RxError::Internal(anyhow::anyhow!("{e}")))?;
    users::update_password(&state.db.pg, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(Json(Ack::with_message("Password updated")))
}

/// GET /api/auth/verify
///
/// Polled by the dashboard to keep its session alive. The account must still
/// exist and be active.
async fn verify_session(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<VerifyResponse>> {
    let user = users::find_by_id(&state.db.pg, auth.user_id)
        .await?
        .ok_or(RxError::InvalidToken)?;
    if !user.is_active {
        return Err(RxError::AccountDisabled);
    }

    Ok(Json(VerifyResponse {
        valid: true,
        role: user.role,
        user: user.into(),
        expires_at: auth.expires_at,
    }))
}

/// POST /api/auth/logout
async fn logout(Extension(auth): Extension<AuthContext>) -> Json<Ack> {
    tracing::debug!(user_id = %auth.user_id, "User logged out");
    Json(Ack::with_message("Logged out"))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use rxdesk_common::models::user::Role;
    use sqlx::PgPool;

    use crate::test_support::{
        access_token, json_body, router_over, send, test_router, JWT_SECRET,
    };

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_validation_fails_before_database() {
        let response = send(
            test_router(),
            post_json(
                "/api/auth/register",
                serde_json::json!({
                    "email": "not-an-email",
                    "password": "short",
                    "first_name": "Jane",
                    "last_name": "Doe"
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "VALIDATION_ERROR");
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("Invalid email format"));
        assert!(message.contains("Password must be 8-128 characters"));
    }

    #[tokio::test]
    async fn test_undecodable_bodies_use_the_error_contract() {
        let response = send(
            test_router(),
            post_json(
                "/api/auth/register",
                serde_json::json!({
                    "email": "jane@example.com",
                    "first_name": "Jane",
                    "last_name": "Doe"
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = json_body(response).await;
        assert_eq!(body["code"], 400);
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().contains("password"));

        let response = send(
            test_router(),
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "VALIDATION_ERROR");
    }

    #[sqlx::test(migrations = "../rxdesk-db/migrations")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_registering_a_taken_email_is_rejected(pool: PgPool) {
        let router = router_over(pool);
        let mut body = serde_json::json!({
            "email": "jane@example.com",
            "password": "correct-horse-battery",
            "first_name": "Jane",
            "last_name": "Doe"
        });

        let response = send(router.clone(), post_json("/api/auth/register", body.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let created = json_body(response).await;
        assert_eq!(created["user"]["role"], "customer");
        assert!(created["access_token"].is_string());

        body["email"] = "JANE@Example.com".into();
        let response = send(router, post_json("/api/auth/register", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let rejected = json_body(response).await;
        assert_eq!(rejected["code"], 400);
        assert_eq!(rejected["error"], "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let response = send(
            test_router(),
            post_json(
                "/api/auth/refresh",
                serde_json::json!({ "refresh_token": access_token(Role::Customer) }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_refresh_token_cannot_authenticate_requests() {
        let pair = crate::auth::generate_token_pair(
            uuid::Uuid::now_v7(),
            "a@example.com",
            Role::Admin,
            JWT_SECRET,
            60,
            600,
        )
        .unwrap();
        let response = send(
            test_router(),
            Request::get("/api/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", pair.refresh_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_is_stateless() {
        let response = send(
            test_router(),
            Request::post("/api/auth/logout")
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", access_token(Role::Customer)),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
    }
}
