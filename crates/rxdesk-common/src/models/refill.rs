//! Refill requests: a patient asks the pharmacy to refill an existing
//! prescription by its Rx number.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::order::Fulfillment;
use crate::validation::{not_blank, past_date, PHONE_REGEX};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefillRequest {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub patient_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: String,
    pub email: Option<String>,
    pub rx_number: String,
    pub medication_name: Option<String>,
    pub fulfillment: Fulfillment,
    pub preferred_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: RefillStatus,
    pub staff_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefillStatus {
    Pending,
    Processing,
    Ready,
    Completed,
    Rejected,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRefillRequest {
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
        length(min = 1, max = 64, message = "Rx number is required"),
        custom(function = "not_blank", message = "Rx number is required")
    )]
    pub rx_number: String,

    #[validate(length(max = 256))]
    pub medication_name: Option<String>,

    pub fulfillment: Option<Fulfillment>,

    pub preferred_date: Option<NaiveDate>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRefillRequest {
    pub status: Option<RefillStatus>,
    #[validate(length(max = 2000))]
    pub staff_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefillFilter {
    pub status: Option<RefillStatus>,
}
