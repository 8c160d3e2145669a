//! Admin user management.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::get,
    Json, Router,
};
use rxdesk_common::{
    error::{RxError, RxResult},
    models::user::{AdminUpdateUserRequest, Role, User, UserFilter, UserResponse},
    pagination::{Page, Pagination},
};
use rxdesk_db::repository::users;
use std::sync::Arc;
use uuid::Uuid;

use super::{with_admin, Ack};
use crate::{extract::JsonBody, middleware::AuthContext, AppState};

/// User routes (admin only).
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    with_admin(
        &state,
        Router::new()
            .route("/admin/users", get(list_users))
            .route(
                "/admin/users/{id}",
                get(get_user).put(update_user).delete(delete_user),
            ),
    )
}

async fn find_user(state: &AppState, id: Uuid) -> RxResult<User> {
    users::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| RxError::not_found("User"))
}

/// Refuse changes that would leave no active admin account.
async fn ensure_other_admin(state: &AppState, target: &User) -> RxResult<()> {
    if target.role.is_admin()
        && target.is_active
        && users::count_active_admins(&state.db.pg).await? <= 1
    {
        return Err(RxError::validation("Cannot remove the last active admin"));
    }
    Ok(())
}

/// GET /api/admin/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<UserFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<UserResponse>>> {
    let (rows, total) = users::list_users(
        &state.db.pg,
        &filter,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;

    Ok(Json(Page::new(
        rows.into_iter().map(UserResponse::from).collect(),
        total,
        &pagination,
    )))
}

/// GET /api/admin/users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<UserResponse>> {
    Ok(Json(find_user(&state, id).await?.into()))
}

/// PUT /api/admin/users/{id}
async fn update_user(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<AdminUpdateUserRequest>,
) -> RxResult<Json<UserResponse>> {
    let target = find_user(&state, id).await?;

    let demoting = body.role.is_some_and(|r| r != Role::Admin);
    let deactivating = body.is_active == Some(false);

    if id == auth.user_id && (demoting || deactivating) {
        return Err(RxError::validation(
            "You cannot demote or deactivate your own account",
        ));
    }
    if demoting || deactivating {
        ensure_other_admin(&state, &target).await?;
    }

    let user = users::update_access(&state.db.pg, id, body.role, body.is_active)
        .await?
        .ok_or_else(|| RxError::not_found("User"))?;

    tracing::info!(
        admin_id = %auth.user_id,
        user_id = %user.id,
        role = ?user.role,
        is_active = user.is_active,
        "User access updated"
    );
    Ok(Json(user.into()))
}

/// DELETE /api/admin/users/{id}
async fn delete_user(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    if id == auth.user_id {
        return Err(RxError::validation("You cannot delete your own account"));
    }

    let target = find_user(&state, id).await?;
    ensure_other_admin(&state, &target).await?;

    if !users::delete_user(&state.db.pg, id).await? {
        return Err(RxError::not_found("User"));
    }

    tracing::info!(admin_id = %auth.user_id, user_id = %id, "User deleted");
    Ok(Json(Ack::ok()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use rxdesk_common::models::user::Role;
    use uuid::Uuid;

    use crate::test_support::{access_token_for, json_body, send, test_router};

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let me = Uuid::now_v7();
        let response = send(
            test_router(),
            Request::delete(format!("/api/admin/users/{me}"))
                .header(header::AUTHORIZATION, format!("Bearer {}", access_token_for(me, Role::Admin)))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["message"],
            "Validation failed: You cannot delete your own account"
        );
    }
}
