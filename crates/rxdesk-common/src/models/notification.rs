//! In-app notifications. A notification targets either one user or the whole
//! staff audience; both are also pushed live through the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::gateway_event::Room;
use crate::validation::not_blank;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub audience: Audience,
    pub user_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Gateway room that receives this notification.
    pub fn room(&self) -> Room {
        match (self.audience, self.user_id) {
            (Audience::User, Some(id)) => Room::User(id),
            _ => Room::Staff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    User,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Prescription,
    Refill,
    Transfer,
    Appointment,
    Contact,
    Payment,
    System,
}

/// What a route hands to the notifier; persisted then broadcast.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub audience: Audience,
    pub user_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub resource_type: Option<&'static str>,
    pub resource_id: Option<Uuid>,
}

impl NewNotification {
    pub fn staff(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            audience: Audience::Staff,
            user_id: None,
            kind,
            title: title.into(),
            message: message.into(),
            resource_type: None,
            resource_id: None,
        }
    }

    pub fn user(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            audience: Audience::User,
            user_id: Some(user_id),
            ..Self::staff(kind, title, message)
        }
    }

    pub fn about(mut self, resource_type: &'static str, resource_id: Uuid) -> Self {
        self.resource_type = Some(resource_type);
        self.resource_id = Some(resource_id);
        self
    }
}

/// Staff-authored notification. No `user_id` means all staff.
#[derive(Debug, Deserialize, Validate)]
pub struct SendNotificationRequest {
    pub user_id: Option<Uuid>,

    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "not_blank", message = "Title is required")
    )]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,
}
