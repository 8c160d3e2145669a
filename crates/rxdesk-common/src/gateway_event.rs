//! Gateway event types: shared between API and Gateway crates.
//!
//! The API emits events when data changes (order placed, prescription reviewed,
//! notification created) and the Gateway forwards them to connected WebSocket
//! sessions that joined the target room.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named broadcast room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Room {
    /// Every pharmacist/admin session
    Staff,
    /// All sessions of one user
    User(Uuid),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Staff => write!(f, "staff"),
            Room::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// Events broadcast through the gateway to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Event type (e.g., "NOTIFICATION_CREATE", "ORDER_UPDATE")
    pub event_type: String,
    /// Event payload as JSON
    pub data: serde_json::Value,
    /// Which room receives the event
    pub room: Room,
}

impl GatewayEvent {
    pub fn new(event_type: &str, room: Room, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            data,
            room,
        }
    }
}

/// Event type names dispatched to clients.
pub mod event_types {
    pub const NOTIFICATION_CREATE: &str = "NOTIFICATION_CREATE";
    pub const ORDER_UPDATE: &str = "ORDER_UPDATE";
    pub const PRESCRIPTION_UPDATE: &str = "PRESCRIPTION_UPDATE";
    pub const REFILL_UPDATE: &str = "REFILL_UPDATE";
    pub const TRANSFER_UPDATE: &str = "TRANSFER_UPDATE";
    pub const APPOINTMENT_UPDATE: &str = "APPOINTMENT_UPDATE";
    pub const DASHBOARD_INVALIDATE: &str = "DASHBOARD_INVALIDATE";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_display() {
        let id = Uuid::nil();
        assert_eq!(Room::Staff.to_string(), "staff");
        assert_eq!(
            Room::User(id).to_string(),
            "user:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_room_serialization() {
        let json = serde_json::to_value(Room::Staff).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "staff"}));
        let id = Uuid::now_v7();
        let json = serde_json::to_value(Room::User(id)).unwrap();
        assert_eq!(json["kind"], "user");
        assert_eq!(json["id"], id.to_string());
    }
}
