//! Prescription uploads and their pharmacist review.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{not_blank, past_date, PHONE_REGEX};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Prescription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub patient_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub doctor_name: Option<String>,
    pub doctor_phone: Option<String>,
    pub medication: Option<String>,
    pub dosage: Option<String>,
    /// Path relative to the private upload root; never exposed
    #[serde(skip_serializing)]
    pub file_path: String,
    pub original_filename: String,
    pub content_type: String,
    pub status: PrescriptionStatus,
    pub pharmacist_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Pending,
    Approved,
    Rejected,
    Filled,
}

/// Text fields accompanying the multipart prescription upload.
#[derive(Debug, Default, Validate)]
pub struct PrescriptionFields {
    #[validate(
        length(min = 1, max = 128, message = "Patient name must be 1-128 characters"),
        custom(function = "not_blank", message = "Patient name is required")
    )]
    pub patient_name: String,

    #[validate(custom(function = "past_date", message = "Date of birth must be in the past"))]
    pub date_of_birth: Option<NaiveDate>,

    #[validate(length(max = 128))]
    pub doctor_name: Option<String>,

    #[validate(regex(path = *PHONE_REGEX, message = "Invalid doctor phone number"))]
    pub doctor_phone: Option<String>,

    #[validate(length(max = 256))]
    pub medication: Option<String>,

    #[validate(length(max = 256))]
    pub dosage: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewPrescriptionRequest {
    pub status: PrescriptionStatus,
    #[validate(length(max = 2000))]
    pub pharmacist_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrescriptionFilter {
    pub status: Option<PrescriptionStatus>,
}
