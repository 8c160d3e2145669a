//! Notification fan-out: persist, then push through the gateway.
//!
//! Nothing in here fails a request. A lost notification is logged; a
//! broadcast with no listening sessions is simply dropped.

use rxdesk_common::{
    gateway_event::{event_types, GatewayEvent, Room},
    ids,
    models::notification::{Audience, NewNotification},
};
use rxdesk_db::repository::notifications;
use serde::Serialize;
use tracing::{error, trace};

use crate::AppState;

impl AppState {
    /// Store a notification and dispatch `NOTIFICATION_CREATE` to its room.
    pub async fn notify(&self, notification: NewNotification) {
        match notifications::create_notification(&self.db.pg, ids::generate_id(), &notification)
            .await
        {
            Ok(stored) => {
                let room = stored.room();
                self.broadcast(event_types::NOTIFICATION_CREATE, room, &stored);
                self.notification_changed(stored.audience).await;
            }
            Err(e) => {
                error!(
                    kind = ?notification.kind,
                    audience = ?notification.audience,
                    "Failed to store notification: {e}"
                );
            }
        }
    }

    /// Push an event to every session in `room`.
    pub fn broadcast<T: Serialize>(&self, event_type: &str, room: Room, payload: &T) {
        let data = match serde_json::to_value(payload) {
            Ok(data) => data,
            Err(e) => {
                error!(event_type, "Failed to encode gateway event: {e}");
                return;
            }
        };
        if self
            .gateway_tx
            .send(GatewayEvent::new(event_type, room, data))
            .is_err()
        {
            trace!(event_type, %room, "No gateway sessions listening");
        }
    }

    /// Send a record update to its owner (when known) and to staff.
    pub fn broadcast_update<T: Serialize>(&self, event_type: &str, owner: Option<uuid::Uuid>, payload: &T) {
        if let Some(user_id) = owner {
            self.broadcast(event_type, Room::User(user_id), payload);
        }
        self.broadcast(event_type, Room::Staff, payload);
    }

    /// Staff notifications feed the dashboard's unread count.
    pub async fn notification_changed(&self, audience: Audience) {
        if audience == Audience::Staff {
            self.dashboard_changed().await;
        }
    }

    /// Drop the cached dashboard and tell staff dashboards to refetch.
    pub async fn dashboard_changed(&self) {
        self.caches.invalidate_dashboard().await;
        self.broadcast(
            event_types::DASHBOARD_INVALIDATE,
            Room::Staff,
            &serde_json::json!({}),
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_state;
    use rxdesk_common::gateway_event::{event_types, Room};

    #[tokio::test]
    async fn test_broadcast_update_reaches_owner_and_staff() {
        let state = test_state();
        let mut rx = state.gateway_tx.subscribe();
        let owner = uuid::Uuid::now_v7();

        state.broadcast_update(event_types::ORDER_UPDATE, Some(owner), &serde_json::json!({"id": 1}));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.room, Room::User(owner));
        assert_eq!(second.room, Room::Staff);
        assert_eq!(second.event_type, event_types::ORDER_UPDATE);
        assert_eq!(second.data["id"], 1);
    }

    #[tokio::test]
    async fn test_broadcast_without_listeners_is_ignored() {
        let state = test_state();
        state.broadcast(event_types::REFILL_UPDATE, Room::Staff, &serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_only_staff_notifications_invalidate_the_dashboard() {
        use rxdesk_common::models::notification::Audience;

        let state = test_state();
        let mut rx = state.gateway_tx.subscribe();

        state.notification_changed(Audience::User).await;
        assert!(rx.try_recv().is_err());

        state.notification_changed(Audience::Staff).await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, event_types::DASHBOARD_INVALIDATE);
    }

    #[tokio::test]
    async fn test_dashboard_changed_emits_invalidate() {
        let state = test_state();
        let mut rx = state.gateway_tx.subscribe();
        state.dashboard_changed().await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, event_types::DASHBOARD_INVALIDATE);
        assert_eq!(event.room, Room::Staff);
    }
}
