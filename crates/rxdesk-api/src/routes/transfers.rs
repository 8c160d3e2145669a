//! Prescription transfer requests from other pharmacies.

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
        transfer::{
            CreateTransferRequest, TransferFilter, TransferRequest, TransferStatus,
            UpdateTransferRequest,
        },
    },
    pagination::{Page, Pagination},
    validation::validate_request,
};
use rxdesk_db::repository::transfers;
use std::sync::Arc;
use uuid::Uuid;

use super::{with_auth, with_optional_auth, with_staff, Ack};
use crate::{extract::JsonBody, middleware::AuthContext, AppState};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let submit = Router::new().route("/transfers", post(create_transfer));
    let mine = Router::new().route("/transfers", get(list_mine));
    let staff = Router::new()
        .route("/admin/transfers", get(list_all))
        .route(
            "/admin/transfers/{id}",
            put(update_transfer).delete(delete_transfer),
        );

    with_optional_auth(&state, submit)
        .merge(with_auth(&state, mine))
        .merge(with_staff(&state, staff))
}

fn status_message(status: TransferStatus, from_pharmacy: &str) -> String {
    match status {
        TransferStatus::Pending => format!("We received your transfer request from {from_pharmacy}."),
        TransferStatus::InProgress => format!("We've contacted {from_pharmacy} about your transfer."),
        TransferStatus::Completed => "Your prescriptions have been transferred.".to_string(),
        TransferStatus::Rejected => {
            format!("We couldn't complete the transfer from {from_pharmacy}. Please call the pharmacy.")
        }
    }
}

/// POST /api/transfers
async fn create_transfer(
    auth: Option<Extension<AuthContext>>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreateTransferRequest>,
) -> RxResult<Json<TransferRequest>> {
    validate_request(&body)?;

    let user_id = auth.map(|Extension(a)| a.user_id);
    let transfer =
        transfers::create_transfer(&state.db.pg, ids::generate_id(), user_id, &body).await?;

    tracing::info!(transfer_id = %transfer.id, guest = user_id.is_none(), "Transfer requested");

    state
        .notify(
            NewNotification::staff(
                NotificationKind::Transfer,
                "New transfer request",
                format!(
                    "{} wants to transfer from {}",
                    transfer.patient_name, transfer.from_pharmacy_name
                ),
            )
            .about("transfer", transfer.id),
        )
        .await;
    state.broadcast_update(event_types::TRANSFER_UPDATE, transfer.user_id, &transfer);
    state.dashboard_changed().await;

    Ok(Json(transfer))
}

/// GET /api/transfers
async fn list_mine(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<Vec<TransferRequest>>> {
    Ok(Json(transfers::list_for_user(&state.db.pg, auth.user_id).await?))
}

/// GET /api/admin/transfers
async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TransferFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<TransferRequest>>> {
    let (rows, total) = transfers::list_transfers(
        &state.db.pg,
        filter.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// PUT /api/admin/transfers/{id}
async fn update_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateTransferRequest>,
) -> RxResult<Json<TransferRequest>> {
    validate_request(&body)?;

    let transfer =
        transfers::update_transfer(&state.db.pg, id, body.status, body.staff_notes.as_deref())
            .await?
            .ok_or_else(|| RxError::not_found("Transfer request"))?;

    tracing::info!(transfer_id = %id, status = ?transfer.status, "Transfer updated");

    if let (Some(status), Some(user_id)) = (body.status, transfer.user_id) {
        state
            .notify(
                NewNotification::user(
                    user_id,
                    NotificationKind::Transfer,
                    "Transfer update",
                    status_message(status, &transfer.from_pharmacy_name),
                )
                .about("transfer", transfer.id),
            )
            .await;
    }
    state.broadcast_update(event_types::TRANSFER_UPDATE, transfer.user_id, &transfer);
    if body.status.is_some() {
        state.dashboard_changed().await;
    }

    Ok(Json(transfer))
}

/// DELETE /api/admin/transfers/{id}
async fn delete_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    if !transfers::delete_transfer(&state.db.pg, id).await? {
        return Err(RxError::not_found("Transfer request"));
    }
    tracing::info!(transfer_id = %id, "Transfer deleted");
    state.dashboard_changed().await;
    Ok(Json(Ack::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{send, test_router};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };

    #[test]
    fn test_status_message_names_pharmacy() {
        assert!(status_message(TransferStatus::InProgress, "Corner Drug").contains("Corner Drug"));
        assert!(!status_message(TransferStatus::Completed, "Corner Drug").contains("Corner Drug"));
    }

    #[tokio::test]
    async fn test_transfer_requires_medications() {
        let request = Request::post("/api/transfers")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"patient_name":"Sam Lee","phone":"555-010-2000","from_pharmacy_name":"Corner Drug","medications":"   "}"#,
            ))
            .unwrap();
        let response = send(test_router(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_staff_listing_needs_login() {
        let response = send(
            test_router(),
            Request::get("/api/admin/transfers").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
