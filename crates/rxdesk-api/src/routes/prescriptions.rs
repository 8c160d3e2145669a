//! Prescription uploads and pharmacist review.
//!
//! POST   /api/prescriptions                       multipart upload (scan + details)
//! GET    /api/prescriptions                       own prescriptions
//! GET    /api/prescriptions/{id}                  owner or staff
//! GET    /api/prescriptions/{id}/file             stream the scan (owner or staff)
//! DELETE /api/prescriptions/{id}                  owner, while pending
//! GET    /api/admin/prescriptions?status=         staff queue
//! PUT    /api/admin/prescriptions/{id}/status     staff review

use axum::{
    body::Body,
    extract::{Extension, Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use rxdesk_common::{
    error::{RxError, RxResult},
    gateway_event::event_types,
    ids,
    models::{
        notification::{NewNotification, NotificationKind},
        prescription::{
            Prescription, PrescriptionFields, PrescriptionFilter, PrescriptionStatus,
            ReviewPrescriptionRequest,
        },
    },
    pagination::{Page, Pagination},
    validation::validate_request,
};
use rxdesk_db::repository::prescriptions::{self, NewPrescription};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::{with_auth, with_staff, Ack};
use crate::{
    extract::JsonBody,
    middleware::AuthContext,
    storage::{Bucket, Upload},
    AppState,
};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let customer = Router::new()
        .route("/prescriptions", get(list_mine).post(upload_prescription))
        .route(
            "/prescriptions/{id}",
            get(get_prescription).delete(delete_prescription),
        )
        .route("/prescriptions/{id}/file", get(download_file));

    let staff = Router::new()
        .route("/admin/prescriptions", get(list_all))
        .route("/admin/prescriptions/{id}/status", put(review_prescription));

    with_auth(&state, customer).merge(with_staff(&state, staff))
}

fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Assign one multipart text field onto the prescription details.
fn apply_field(fields: &mut PrescriptionFields, name: &str, value: String) -> RxResult<()> {
    match name {
        "patient_name" => fields.patient_name = value.trim().to_string(),
        "date_of_birth" => {
            fields.date_of_birth = optional_text(value)
                .map(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d"))
                .transpose()
                .map_err(|_| RxError::validation("Date of birth must be YYYY-MM-DD"))?;
        }
        "doctor_name" => fields.doctor_name = optional_text(value),
        "doctor_phone" => fields.doctor_phone = optional_text(value),
        "medication" => fields.medication = optional_text(value),
        "dosage" => fields.dosage = optional_text(value),
        _ => {} // Ignore unknown fields
    }
    Ok(())
}

/// `Content-Disposition` needs a plain ASCII filename.
fn disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let safe = if safe.is_empty() { "prescription" } else { &safe };
    format!("inline; filename=\"{safe}\"")
}

async fn find_visible(state: &AppState, auth: &AuthContext, id: Uuid) -> RxResult<Prescription> {
    prescriptions::find_by_id(&state.db.pg, id)
        .await?
        .filter(|p| auth.can_access(Some(p.user_id)))
        .ok_or_else(|| RxError::not_found("Prescription"))
}

/// POST /api/prescriptions
///
/// Form fields: `file` (required) plus `patient_name`, `date_of_birth`,
/// `doctor_name`, `doctor_phone`, `medication`, `dosage`.
async fn upload_prescription(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> RxResult<Json<Prescription>> {
    let mut fields = PrescriptionFields::default();
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RxError::validation(format!("Multipart error: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            upload = Some(state.storage.read_field(field).await?);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| RxError::validation(format!("Multipart error: {e}")))?;
            apply_field(&mut fields, &name, value)?;
        }
    }

    let upload = upload.ok_or_else(|| RxError::validation("Prescription file is required"))?;
    validate_request(&fields)?;

    let stored = state.storage.save(Bucket::Prescriptions, &upload).await?;

    let created = prescriptions::create_prescription(
        &state.db.pg,
        ids::generate_id(),
        NewPrescription {
            user_id: auth.user_id,
            patient_name: &fields.patient_name,
            date_of_birth: fields.date_of_birth,
            doctor_name: fields.doctor_name.as_deref(),
            doctor_phone: fields.doctor_phone.as_deref(),
            medication: fields.medication.as_deref(),
            dosage: fields.dosage.as_deref(),
            file_path: &stored.path,
            original_filename: &stored.original_filename,
            content_type: &stored.content_type,
        },
    )
    .await;

    let prescription = match created {
        Ok(p) => p,
        Err(e) => {
            state.storage.delete(&stored.path).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        prescription_id = %prescription.id,
        user_id = %auth.user_id,
        size = stored.size,
        "Prescription uploaded"
    );

    state
        .notify(
            NewNotification::staff(
                NotificationKind::Prescription,
                "New prescription",
                format!("Prescription uploaded for {}", prescription.patient_name),
            )
            .about("prescription", prescription.id),
        )
        .await;
    state.broadcast_update(
        event_types::PRESCRIPTION_UPDATE,
        Some(prescription.user_id),
        &prescription,
    );
    state.dashboard_changed().await;

    Ok(Json(prescription))
}

/// GET /api/prescriptions
async fn list_mine(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PrescriptionFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<Prescription>>> {
    let (rows, total) = prescriptions::list_prescriptions(
        &state.db.pg,
        Some(auth.user_id),
        filter.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// GET /api/prescriptions/{id}
async fn get_prescription(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Prescription>> {
    Ok(Json(find_visible(&state, &auth, id).await?))
}

/// GET /api/prescriptions/{id}/file
async fn download_file(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Response> {
    let prescription = find_visible(&state, &auth, id).await?;
    let (file, len) = state.storage.open(&prescription.file_path).await?;

    Ok((
        [
            (header::CONTENT_TYPE, prescription.content_type),
            (header::CONTENT_LENGTH, len.to_string()),
            (header::CONTENT_DISPOSITION, disposition(&prescription.original_filename)),
            (header::CACHE_CONTROL, "private, no-store".to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// DELETE /api/prescriptions/{id}
async fn delete_prescription(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    let prescription = prescriptions::find_by_id(&state.db.pg, id)
        .await?
        .filter(|p| p.user_id == auth.user_id)
        .ok_or_else(|| RxError::not_found("Prescription"))?;

    if prescription.status != PrescriptionStatus::Pending {
        return Err(RxError::validation(
            "Only prescriptions awaiting review can be deleted",
        ));
    }

    prescriptions::delete_prescription(&state.db.pg, id).await?;
    state.storage.delete(&prescription.file_path).await;

    tracing::info!(prescription_id = %id, user_id = %auth.user_id, "Prescription deleted");
    state.dashboard_changed().await;
    Ok(Json(Ack::ok()))
}

/// GET /api/admin/prescriptions
async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PrescriptionFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<Prescription>>> {
    let (rows, total) = prescriptions::list_prescriptions(
        &state.db.pg,
        None,
        filter.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// PUT /api/admin/prescriptions/{id}/status
async fn review_prescription(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<ReviewPrescriptionRequest>,
) -> RxResult<Json<Prescription>> {
    validate_request(&body)?;

    let prescription = prescriptions::review(
        &state.db.pg,
        id,
        body.status,
        body.pharmacist_notes.as_deref(),
        auth.user_id,
    )
    .await?
    .ok_or_else(|| RxError::not_found("Prescription"))?;

    tracing::info!(
        prescription_id = %id,
        pharmacist_id = %auth.user_id,
        status = ?prescription.status,
        "Prescription reviewed"
    );

    let message = match prescription.status {
        PrescriptionStatus::Pending => "Your prescription is awaiting review.",
        PrescriptionStatus::Approved => "Your prescription has been approved.",
        PrescriptionStatus::Rejected => "Your prescription could not be approved. See the pharmacist's notes.",
        PrescriptionStatus::Filled => "Your prescription has been filled.",
    };
    state
        .notify(
            NewNotification::user(
                prescription.user_id,
                NotificationKind::Prescription,
                "Prescription update",
                message,
            )
            .about("prescription", prescription.id),
        )
        .await;
    state.broadcast_update(
        event_types::PRESCRIPTION_UPDATE,
        Some(prescription.user_id),
        &prescription,
    );
    state.dashboard_changed().await;

    Ok(Json(prescription))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_fields() {
        let mut fields = PrescriptionFields::default();
        apply_field(&mut fields, "patient_name", "  Jane Doe ".into()).unwrap();
        apply_field(&mut fields, "date_of_birth", "1980-02-29".into()).unwrap();
        apply_field(&mut fields, "doctor_name", "   ".into()).unwrap();
        apply_field(&mut fields, "medication", "Lisinopril".into()).unwrap();
        apply_field(&mut fields, "unknown", "ignored".into()).unwrap();

        assert_eq!(fields.patient_name, "Jane Doe");
        assert_eq!(fields.date_of_birth, NaiveDate::from_ymd_opt(1980, 2, 29));
        assert_eq!(fields.doctor_name, None);
        assert_eq!(fields.medication.as_deref(), Some("Lisinopril"));
        assert!(validate_request(&fields).is_ok());
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let mut fields = PrescriptionFields::default();
        assert!(apply_field(&mut fields, "date_of_birth", "29/02/1980".into()).is_err());
        assert!(apply_field(&mut fields, "date_of_birth", "".into()).is_ok());
        assert_eq!(fields.date_of_birth, None);
    }

    #[test]
    fn test_missing_patient_name_fails_validation() {
        assert!(validate_request(&PrescriptionFields::default()).is_err());
    }

    #[test]
    fn test_disposition_is_ascii() {
        assert_eq!(disposition("scan 1.pdf"), "inline; filename=\"scan1.pdf\"");
        assert_eq!(disposition("ñ\"\r\n"), "inline; filename=\"prescription\"");
    }
}
