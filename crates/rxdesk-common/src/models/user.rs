//! User model: customers and pharmacy staff share one account table,
//! distinguished by [`Role`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{not_blank, past_date, PHONE_REGEX};

/// An rxdesk account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Login identifier, unique case-insensitively
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub role: Role,
    pub is_active: bool,

    /// Payments provider customer, created on first payment
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,

    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Pharmacist,
    Admin,
}

impl Role {
    /// Pharmacists and admins work the admin dashboard.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Pharmacist | Role::Admin)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(
        length(min = 1, max = 64, message = "First name must be 1-64 characters"),
        custom(function = "not_blank", message = "First name is required")
    )]
    pub first_name: String,

    #[validate(
        length(min = 1, max = 64, message = "Last name must be 1-64 characters"),
        custom(function = "not_blank", message = "Last name is required")
    )]
    pub last_name: String,

    #[validate(regex(path = *PHONE_REGEX, message = "Invalid phone number"))]
    pub phone: Option<String>,

    #[validate(custom(function = "past_date", message = "Date of birth must be in the past"))]
    pub date_of_birth: Option<NaiveDate>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
}

/// Update own profile
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 64))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub last_name: Option<String>,

    #[validate(regex(path = *PHONE_REGEX, message = "Invalid phone number"))]
    pub phone: Option<String>,

    #[validate(custom(function = "past_date", message = "Date of birth must be in the past"))]
    pub date_of_birth: Option<NaiveDate>,

    #[validate(length(max = 500))]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 128, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

/// Admin-side account changes
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub search: Option<String>,
}

/// Safe user representation for API responses (no sensitive fields)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            phone: u.phone,
            date_of_birth: u.date_of_birth,
            address: u.address,
            role: u.role,
            is_active: u.is_active,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_request;

    #[test]
    fn test_role_guards() {
        assert!(!Role::Customer.is_staff());
        assert!(Role::Pharmacist.is_staff());
        assert!(!Role::Pharmacist.is_admin());
        assert!(Role::Admin.is_staff() && Role::Admin.is_admin());
    }

    #[test]
    fn test_register_request_validation() {
        let body: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "jane@example.com",
            "password": "correct horse",
            "first_name": "Jane",
            "last_name": "Doe",
            "phone": "555-010-2000"
        }))
        .unwrap();
        assert!(validate_request(&body).is_ok());

        let body: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "jane@example.com",
            "password": "short",
            "first_name": "   ",
            "last_name": "Doe"
        }))
        .unwrap();
        let err = validate_request(&body).unwrap_err().to_string();
        assert!(err.contains("Password must be 8-128 characters"));
        assert!(err.contains("First name is required"));
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            email: "a@b.co".into(),
            password_hash: "$argon2id$secret".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone: None,
            date_of_birth: None,
            address: None,
            role: Role::Customer,
            is_active: true,
            stripe_customer_id: Some("cus_123".into()),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("cus_123"));
    }
}
