//! Appointment booking and the staff schedule.

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
        appointment::{
            Appointment, AppointmentFilter, AppointmentStatus, CreateAppointmentRequest,
            UpdateAppointmentRequest,
        },
        notification::{NewNotification, NotificationKind},
    },
    pagination::{Page, Pagination},
    validation::validate_request,
};
use rxdesk_db::repository::appointments;
use std::sync::Arc;
use uuid::Uuid;

use super::{with_auth, with_optional_auth, with_staff, Ack};
use crate::{extract::JsonBody, middleware::AuthContext, AppState};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let book = Router::new().route("/appointments", post(create_appointment));
    let mine = Router::new()
        .route("/appointments", get(list_mine))
        .route("/appointments/{id}/cancel", post(cancel_appointment));
    let staff = Router::new()
        .route("/admin/appointments", get(list_all))
        .route(
            "/admin/appointments/{id}",
            put(update_appointment).delete(delete_appointment),
        );

    with_optional_auth(&state, book)
        .merge(with_auth(&state, mine))
        .merge(with_staff(&state, staff))
}

fn describe(appointment: &Appointment) -> String {
    format!(
        "{} at {}",
        appointment.preferred_date.format("%b %-d, %Y"),
        appointment.preferred_time
    )
}

/// POST /api/appointments
async fn create_appointment(
    auth: Option<Extension<AuthContext>>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreateAppointmentRequest>,
) -> RxResult<Json<Appointment>> {
    validate_request(&body)?;

    let user_id = auth.map(|Extension(a)| a.user_id);
    let appointment =
        appointments::create_appointment(&state.db.pg, ids::generate_id(), user_id, &body)
            .await?;

    tracing::info!(
        appointment_id = %appointment.id,
        service = ?appointment.service_type,
        date = %appointment.preferred_date,
        "Appointment booked"
    );

    state
        .notify(
            NewNotification::staff(
                NotificationKind::Appointment,
                "New appointment",
                format!("{} booked for {}", appointment.name, describe(&appointment)),
            )
            .about("appointment", appointment.id),
        )
        .await;
    state.broadcast_update(event_types::APPOINTMENT_UPDATE, appointment.user_id, &appointment);
    state.dashboard_changed().await;

    Ok(Json(appointment))
}

/// GET /api/appointments
async fn list_mine(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<Vec<Appointment>>> {
    Ok(Json(appointments::list_for_user(&state.db.pg, auth.user_id).await?))
}

/// POST /api/appointments/{id}/cancel
async fn cancel_appointment(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Appointment>> {
    let appointment = appointments::find_by_id(&state.db.pg, id)
        .await?
        .filter(|a| a.user_id == Some(auth.user_id))
        .ok_or_else(|| RxError::not_found("Appointment"))?;

    if !appointment.status.is_cancellable() {
        return Err(RxError::validation("This appointment can no longer be cancelled"));
    }

    let appointment = appointments::update_appointment(
        &state.db.pg,
        id,
        Some(AppointmentStatus::Cancelled),
        None,
        None,
        None,
    )
    .await?
    .ok_or_else(|| RxError::not_found("Appointment"))?;

    tracing::info!(appointment_id = %id, user_id = %auth.user_id, "Appointment cancelled by customer");

    state
        .notify(
            NewNotification::staff(
                NotificationKind::Appointment,
                "Appointment cancelled",
                format!("{} cancelled {}", appointment.name, describe(&appointment)),
            )
            .about("appointment", appointment.id),
        )
        .await;
    state.broadcast_update(event_types::APPOINTMENT_UPDATE, appointment.user_id, &appointment);
    state.dashboard_changed().await;

    Ok(Json(appointment))
}

/// GET /api/admin/appointments?status=&date=
async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AppointmentFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<Appointment>>> {
    let (rows, total) = appointments::list_appointments(
        &state.db.pg,
        &filter,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// PUT /api/admin/appointments/{id}: confirm, reschedule or close out.
async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateAppointmentRequest>,
) -> RxResult<Json<Appointment>> {
    validate_request(&body)?;

    let appointment = appointments::update_appointment(
        &state.db.pg,
        id,
        body.status,
        body.preferred_date,
        body.preferred_time.as_deref(),
        body.staff_notes.as_deref(),
    )
    .await?
    .ok_or_else(|| RxError::not_found("Appointment"))?;

    tracing::info!(appointment_id = %id, status = ?appointment.status, "Appointment updated");

    let rescheduled = body.preferred_date.is_some() || body.preferred_time.is_some();
    let message = match body.status {
        Some(AppointmentStatus::Confirmed) => {
            Some(format!("Your appointment on {} is confirmed.", describe(&appointment)))
        }
        Some(AppointmentStatus::Cancelled) => Some(format!(
            "Your appointment on {} was cancelled by the pharmacy.",
            describe(&appointment)
        )),
        _ if rescheduled => Some(format!(
            "Your appointment was moved to {}.",
            describe(&appointment)
        )),
        _ => None,
    };
    if let (Some(message), Some(user_id)) = (message, appointment.user_id) {
        state
            .notify(
                NewNotification::user(
                    user_id,
                    NotificationKind::Appointment,
                    "Appointment update",
                    message,
                )
                .about("appointment", appointment.id),
            )
            .await;
    }
    state.broadcast_update(event_types::APPOINTMENT_UPDATE, appointment.user_id, &appointment);
    if body.status.is_some() || rescheduled {
        state.dashboard_changed().await;
    }

    Ok(Json(appointment))
}

/// DELETE /api/admin/appointments/{id}
async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    if !appointments::delete_appointment(&state.db.pg, id).await? {
        return Err(RxError::not_found("Appointment"));
    }
    tracing::info!(appointment_id = %id, "Appointment deleted");
    state.dashboard_changed().await;
    Ok(Json(Ack::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{access_token, json_body, send, test_router};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use chrono::{NaiveDate, Utc};
    use rxdesk_common::models::{appointment::ServiceType, user::Role};

    #[test]
    fn test_describe() {
        let appointment = Appointment {
            id: Uuid::now_v7(),
            user_id: None,
            name: "Sam Patient".into(),
            email: "sam@example.com".into(),
            phone: "555 010 3000".into(),
            service_type: ServiceType::Vaccination,
            preferred_date: NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
            preferred_time: "09:30".into(),
            status: AppointmentStatus::Pending,
            notes: None,
            staff_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(describe(&appointment), "Mar 7, 2026 at 09:30");
    }

    #[tokio::test]
    async fn test_booking_in_the_past_is_rejected() {
        let request = Request::post("/api/appointments")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"name":"Sam","email":"sam@example.com","phone":"555 010 3000",
                    "service_type":"vaccination","preferred_date":"2001-01-01","preferred_time":"09:30"}"#,
            ))
            .unwrap();
        let response = send(test_router(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Preferred date cannot be in the past"));
    }

    #[tokio::test]
    async fn test_pharmacist_reschedule_validates_time() {
        let request = Request::put(format!("/api/admin/appointments/{}", Uuid::now_v7()))
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token(Role::Pharmacist)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"preferred_time":"25:00"}"#))
            .unwrap();
        assert_eq!(send(test_router(), request).await.status(), StatusCode::BAD_REQUEST);
    }
}
