//! In-store appointments (consultations, vaccinations, screenings).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::validation::{not_blank, PHONE_REGEX, TIME_OF_DAY_REGEX};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_type: ServiceType,
    pub preferred_date: NaiveDate,
    /// `HH:MM`, store local time
    pub preferred_time: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub staff_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Consultation,
    Vaccination,
    HealthScreening,
    MedicationReview,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Customers can withdraw until the appointment has happened.
    pub fn is_cancellable(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

fn not_in_past(value: &NaiveDate) -> Result<(), ValidationError> {
    if *value < Utc::now().date_naive() {
        return Err(ValidationError::new("date_in_past"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    #[validate(
        length(min = 1, max = 128, message = "Name must be 1-128 characters"),
        custom(function = "not_blank", message = "Name is required")
    )]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(regex(path = *PHONE_REGEX, message = "Invalid phone number"))]
    pub phone: String,

    pub service_type: ServiceType,

    #[validate(custom(function = "not_in_past", message = "Preferred date cannot be in the past"))]
    pub preferred_date: NaiveDate,

    #[validate(regex(path = *TIME_OF_DAY_REGEX, message = "Preferred time must be HH:MM"))]
    pub preferred_time: String,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAppointmentRequest {
    pub status: Option<AppointmentStatus>,

    #[validate(custom(function = "not_in_past", message = "Preferred date cannot be in the past"))]
    pub preferred_date: Option<NaiveDate>,

    #[validate(regex(path = *TIME_OF_DAY_REGEX, message = "Preferred time must be HH:MM"))]
    pub preferred_time: Option<String>,

    #[validate(length(max = 2000))]
    pub staff_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
}
