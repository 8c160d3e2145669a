//! Contact form: public submission, staff inbox.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use rxdesk_common::{
    error::{RxError, RxResult},
    ids,
    models::{
        contact::{ContactFilter, ContactForm, CreateContactRequest, UpdateContactStatusRequest},
        notification::{NewNotification, NotificationKind},
    },
    pagination::{Page, Pagination},
    validation::validate_request,
};
use rxdesk_db::repository::contact;
use std::sync::Arc;
use uuid::Uuid;

use super::{with_staff, Ack};
use crate::{extract::JsonBody, AppState};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new().route("/contact", post(submit));
    let staff = Router::new()
        .route("/admin/contact", get(list_all))
        .route("/admin/contact/{id}/status", put(set_status))
        .route("/admin/contact/{id}", delete(delete_submission));

    public.merge(with_staff(&state, staff))
}

/// POST /api/contact
async fn submit(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreateContactRequest>,
) -> RxResult<Json<Ack>> {
    validate_request(&body)?;

    let form = contact::create_contact(&state.db.pg, ids::generate_id(), &body).await?;
    tracing::info!(contact_id = %form.id, "Contact form received");

    let summary = form
        .subject
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map_or_else(|| format!("Message from {}", form.name), |s| format!("{}: {s}", form.name));
    state
        .notify(
            NewNotification::staff(NotificationKind::Contact, "New contact message", summary)
                .about("contact", form.id),
        )
        .await;
    state.dashboard_changed().await;

    Ok(Json(Ack::with_message(
        "Thanks for reaching out. We'll get back to you soon.",
    )))
}

/// GET /api/admin/contact?status=
async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ContactFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<ContactForm>>> {
    let (rows, total) = contact::list_contacts(
        &state.db.pg,
        filter.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// PUT /api/admin/contact/{id}/status
async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateContactStatusRequest>,
) -> RxResult<Json<ContactForm>> {
    let form = contact::set_status(&state.db.pg, id, body.status)
        .await?
        .ok_or_else(|| RxError::not_found("Contact submission"))?;
    state.dashboard_changed().await;
    Ok(Json(form))
}

/// DELETE /api/admin/contact/{id}
async fn delete_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    if !contact::delete_contact(&state.db.pg, id).await? {
        return Err(RxError::not_found("Contact submission"));
    }
    state.dashboard_changed().await;
    Ok(Json(Ack::ok()))
}
