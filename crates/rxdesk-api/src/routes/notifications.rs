//! Notification inbox.
//!
//! Customers see notifications addressed to them. Staff additionally see the
//! shared staff feed, where one read flag covers every staff member.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use rxdesk_common::{
    error::{RxError, RxResult},
    models::notification::{
        Audience, NewNotification, Notification, NotificationFilter, NotificationKind,
        SendNotificationRequest,
    },
    pagination::{Page, Pagination},
    validation::validate_request,
};
use rxdesk_db::repository::{notifications, users};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{with_auth, with_staff, Ack};
use crate::{extract::JsonBody, middleware::AuthContext, AppState};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let inbox = Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", put(mark_all_read))
        .route("/notifications/{id}/read", put(mark_read))
        .route("/notifications/{id}", axum::routing::delete(delete_notification));

    let staff = Router::new().route("/admin/notifications", post(send_notification));

    with_auth(&state, inbox).merge(with_staff(&state, staff))
}

#[derive(Debug, Serialize)]
struct UnreadCount {
    count: i64,
}

#[derive(Debug, Serialize)]
struct MarkedRead {
    updated: u64,
}

/// GET /api/notifications?unread_only=
async fn list_notifications(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<NotificationFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<Notification>>> {
    let (rows, total) = notifications::list_visible(
        &state.db.pg,
        auth.user_id,
        auth.is_staff(),
        filter.unread_only,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// GET /api/notifications/unread-count
async fn unread_count(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<UnreadCount>> {
    let count = notifications::unread_count(&state.db.pg, auth.user_id, auth.is_staff()).await?;
    Ok(Json(UnreadCount { count }))
}

/// PUT /api/notifications/{id}/read
async fn mark_read(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Notification>> {
    let notification = notifications::mark_read(&state.db.pg, id, auth.user_id, auth.is_staff())
        .await?
        .ok_or_else(|| RxError::not_found("Notification"))?;
    state.notification_changed(notification.audience).await;
    Ok(Json(notification))
}

/// PUT /api/notifications/read-all
async fn mark_all_read(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<MarkedRead>> {
    let updated = notifications::mark_all_read(&state.db.pg, auth.user_id, auth.is_staff()).await?;
    if auth.is_staff() && updated > 0 {
        state.notification_changed(Audience::Staff).await;
    }
    Ok(Json(MarkedRead { updated }))
}

/// DELETE /api/notifications/{id}
async fn delete_notification(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    if !notifications::delete_notification(&state.db.pg, id, auth.user_id, auth.is_staff()).await? {
        return Err(RxError::not_found("Notification"));
    }
    // Staff may have removed an unread item from the shared feed
    if auth.is_staff() {
        state.notification_changed(Audience::Staff).await;
    }
    Ok(Json(Ack::ok()))
}

/// POST /api/admin/notifications
///
/// With `user_id` the message goes to that customer, otherwise to all staff.
async fn send_notification(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<SendNotificationRequest>,
) -> RxResult<Json<Ack>> {
    validate_request(&body)?;

    let notification = match body.user_id {
        Some(user_id) => {
            users::find_by_id(&state.db.pg, user_id)
                .await?
                .ok_or_else(|| RxError::not_found("User"))?;
            NewNotification::user(user_id, NotificationKind::System, body.title.trim(), body.message)
        }
        None => NewNotification::staff(NotificationKind::System, body.title.trim(), body.message),
    };

    tracing::info!(
        sender_id = %auth.user_id,
        recipient = ?body.user_id,
        "Manual notification sent"
    );
    state.notify(notification).await;

    Ok(Json(Ack::with_message("Notification sent")))
}
