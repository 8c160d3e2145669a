//! Transfer requests for moving a patient's prescriptions here from another
//! pharmacy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{not_blank, past_date, PHONE_REGEX};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransferRequest {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub patient_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: String,
    pub email: Option<String>,
    pub from_pharmacy_name: String,
    pub from_pharmacy_phone: Option<String>,
    pub rx_numbers: Option<String>,
    pub medications: String,
    pub notes: Option<String>,
    pub status: TransferStatus,
    pub staff_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferRequest {
    #[validate(
        length(min = 1, max = 128, message = "Patient name must be 1-128 characters"),
        custom(function = "not_blank", message = "Patient name is required")
    )]
    pub patient_name: String,

    #[validate(custom(function = "past_date", message = "Date of birth must be in the past"))]
    pub date_of_birth: Option<NaiveDate>,

    #[validate(regex(path = *PHONE_REGEX, message = "Invalid phone number"))]
    pub phone: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(
        length(min = 1, max = 128, message = "Current pharmacy name is required"),
        custom(function = "not_blank", message = "Current pharmacy name is required")
    )]
    pub from_pharmacy_name: String,

    #[validate(regex(path = *PHONE_REGEX, message = "Invalid pharmacy phone number"))]
    pub from_pharmacy_phone: Option<String>,

    #[validate(length(max = 512))]
    pub rx_numbers: Option<String>,

    #[validate(
        length(min = 1, max = 2000, message = "List at least one medication"),
        custom(function = "not_blank", message = "List at least one medication")
    )]
    pub medications: String,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTransferRequest {
    pub status: Option<TransferStatus>,
    #[validate(length(max = 2000))]
    pub staff_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
}
