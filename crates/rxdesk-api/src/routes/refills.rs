//! Refill requests. Guests may submit one; signed-in patients see theirs.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use rxdesk_common::{
    error::{RxError, RxResult},
    gateway_event::event_types,
    ids,
    models::{
        notification::{NewNotification, NotificationKind},
        refill::{CreateRefillRequest, RefillFilter, RefillRequest, RefillStatus, UpdateRefillRequest},
    },
    pagination::{Page, Pagination},
    validation::validate_request,
};
use rxdesk_db::repository::refills;
use std::sync::Arc;
use uuid::Uuid;

use super::{with_auth, with_optional_auth, with_staff, Ack};
use crate::{extract::JsonBody, middleware::AuthContext, AppState};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let submit = Router::new().route("/refills", post(create_refill));
    let mine = Router::new().route("/refills", get(list_mine));
    let staff = Router::new()
        .route("/admin/refills", get(list_all))
        .route("/admin/refills/{id}", put(update_refill).delete(delete_refill));

    with_optional_auth(&state, submit)
        .merge(with_auth(&state, mine))
        .merge(with_staff(&state, staff))
}

fn status_message(status: RefillStatus, rx_number: &str) -> String {
    match status {
        RefillStatus::Pending => format!("Your refill request for Rx {rx_number} was received."),
        RefillStatus::Processing => format!("We're working on your refill for Rx {rx_number}."),
        RefillStatus::Ready => format!("Your refill for Rx {rx_number} is ready."),
        RefillStatus::Completed => format!("Your refill for Rx {rx_number} is complete."),
        RefillStatus::Rejected => {
            format!("We couldn't process your refill for Rx {rx_number}. Please call the pharmacy.")
        }
    }
}

/// POST /api/refills
async fn create_refill(
    auth: Option<Extension<AuthContext>>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreateRefillRequest>,
) -> RxResult<Json<RefillRequest>> {
    validate_request(&body)?;

    let user_id = auth.map(|Extension(a)| a.user_id);
    let refill = refills::create_refill(&state.db.pg, ids::generate_id(), user_id, &body).await?;

    tracing::info!(refill_id = %refill.id, guest = user_id.is_none(), "Refill requested");

    state
        .notify(
            NewNotification::staff(
                NotificationKind::Refill,
                "New refill request",
                format!("{} requested a refill of Rx {}", refill.patient_name, refill.rx_number),
            )
            .about("refill", refill.id),
        )
        .await;
    state.broadcast_update(event_types::REFILL_UPDATE, refill.user_id, &refill);
    state.dashboard_changed().await;

    Ok(Json(refill))
}

/// GET /api/refills
async fn list_mine(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<Vec<RefillRequest>>> {
    Ok(Json(refills::list_for_user(&state.db.pg, auth.user_id).await?))
}

/// GET /api/admin/refills
async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RefillFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<RefillRequest>>> {
    let (rows, total) = refills::list_refills(
        &state.db.pg,
        filter.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// PUT /api/admin/refills/{id}
async fn update_refill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateRefillRequest>,
) -> RxResult<Json<RefillRequest>> {
    validate_request(&body)?;

    let refill = refills::update_refill(&state.db.pg, id, body.status, body.staff_notes.as_deref())
        .await?
        .ok_or_else(|| RxError::not_found("Refill request"))?;

    tracing::info!(refill_id = %id, status = ?refill.status, "Refill updated");

    if let (Some(status), Some(user_id)) = (body.status, refill.user_id) {
        state
            .notify(
                NewNotification::user(
                    user_id,
                    NotificationKind::Refill,
                    "Refill update",
                    status_message(status, &refill.rx_number),
                )
                .about("refill", refill.id),
            )
            .await;
    }
    state.broadcast_update(event_types::REFILL_UPDATE, refill.user_id, &refill);
    if body.status.is_some() {
        state.dashboard_changed().await;
    }

    Ok(Json(refill))
}

/// DELETE /api/admin/refills/{id}
async fn delete_refill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    if !refills::delete_refill(&state.db.pg, id).await? {
        return Err(RxError::not_found("Refill request"));
    }
    tracing::info!(refill_id = %id, "Refill deleted");
    state.dashboard_changed().await;
    Ok(Json(Ack::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{access_token, send, test_router};
    use axum::{body::Body, http::{header, Request, StatusCode}};
    use rxdesk_common::models::user::Role;

    #[test]
    fn test_status_messages_mention_rx_number() {
        for status in [
            RefillStatus::Pending,
            RefillStatus::Processing,
            RefillStatus::Ready,
            RefillStatus::Completed,
            RefillStatus::Rejected,
        ] {
            assert!(status_message(status, "RX-4471").contains("RX-4471"));
        }
    }

    #[tokio::test]
    async fn test_guest_submission_is_validated() {
        let request = Request::post("/api/refills")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"patient_name":"","phone":"not a phone","rx_number":"RX-1"}"#,
            ))
            .unwrap();
        let response = send(test_router(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_listing_own_refills_needs_login() {
        let response = send(
            test_router(),
            Request::get("/api/refills").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_customer_cannot_manage_refills() {
        let request = Request::delete(format!("/api/admin/refills/{}", Uuid::now_v7()))
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token(Role::Customer)))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(test_router(), request).await.status(), StatusCode::FORBIDDEN);
    }
}
