//! Gateway session registry and room membership.

use std::collections::HashMap;

use rxdesk_common::{gateway_event::Room, models::user::Role};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Rooms a session joins once identified: its own user room, plus the
/// staff room for pharmacists and admins.
pub fn rooms_for(user_id: Uuid, role: Role) -> Vec<Room> {
    let mut rooms = vec![Room::User(user_id)];
    if role.is_staff() {
        rooms.push(Room::Staff);
    }
    rooms
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
    pub rooms: Vec<Room>,
    pub identified_at: chrono::DateTime<chrono::Utc>,
}

/// Tracks identified sessions. A user may hold several (one per device).
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace, on re-identify) a session.
    pub async fn register(&self, session_id: Uuid, session: Session) {
        self.sessions.write().await.insert(session_id, session);
    }

    pub async fn remove(&self, session_id: Uuid) -> Option<Session> {
        self.sessions.write().await.remove(&session_id)
    }

    /// Identified sessions belonging to `user_id`.
    pub async fn user_session_count(&self, user_id: Uuid) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: Uuid, role: Role) -> Session {
        Session {
            user_id,
            role,
            rooms: rooms_for(user_id, role),
            identified_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_rooms_by_role() {
        let id = Uuid::now_v7();
        assert_eq!(rooms_for(id, Role::Customer), vec![Room::User(id)]);
        assert_eq!(rooms_for(id, Role::Pharmacist), vec![Room::User(id), Room::Staff]);
        assert_eq!(rooms_for(id, Role::Admin), vec![Room::User(id), Room::Staff]);
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let manager = SessionManager::new();
        let user = Uuid::now_v7();
        let (phone, laptop) = (Uuid::now_v7(), Uuid::now_v7());

        manager.register(phone, session(user, Role::Customer)).await;
        manager.register(laptop, session(user, Role::Customer)).await;
        manager
            .register(Uuid::now_v7(), session(Uuid::now_v7(), Role::Admin))
            .await;

        assert_eq!(manager.active_count().await, 3);
        assert_eq!(manager.user_session_count(user).await, 2);

        assert!(manager.remove(phone).await.is_some());
        assert!(manager.remove(phone).await.is_none());
        assert_eq!(manager.user_session_count(user).await, 1);
    }
}
