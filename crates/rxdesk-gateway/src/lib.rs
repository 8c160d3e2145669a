//! # rxdesk-gateway
//!
//! Real-time WebSocket gateway for rxdesk. Handles:
//! - Client connections authenticated with an API access token
//! - Room membership (`user:{id}` for everyone, `staff` for pharmacists and admins)
//! - Event dispatch from the REST API's broadcast channel
//! - Heartbeat/keepalive and periodic token expiry checks
//!
//! Frames are JSON objects `{ "op": <name>, "d": <payload> }`.

pub mod session;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use rxdesk_common::{
    auth::validate_token,
    config::AppConfig,
    gateway_event::{GatewayEvent, Room},
    models::user::Role,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use session::{rooms_for, Session, SessionManager};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Gateway state.
#[derive(Clone)]
pub struct GatewayState {
    /// Shared with the REST API, which publishes every event here.
    pub broadcast: broadcast::Sender<GatewayEvent>,
    pub sessions: Arc<SessionManager>,
    jwt_secret: SecretString,
    heartbeat_interval_ms: u64,
    reauth_interval: Duration,
}

impl GatewayState {
    pub fn new(config: &AppConfig, broadcast: broadcast::Sender<GatewayEvent>) -> Self {
        Self {
            broadcast,
            sessions: Arc::new(SessionManager::new()),
            jwt_secret: config.auth.jwt_secret.clone(),
            heartbeat_interval_ms: config.gateway.heartbeat_interval_ms,
            reauth_interval: Duration::from_secs(config.gateway.reauth_interval_secs.max(1)),
        }
    }
}

/// Gateway opcodes: what the client and server send to each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum GatewayMessage {
    /// Server → Client: sent on connect, prompts `Identify`
    Hello { heartbeat_interval: u64 },

    /// Client → Server: authenticate with an access token
    Identify { token: String },

    /// Server → Client: identified, with the rooms joined
    Ready {
        session_id: Uuid,
        user_id: Uuid,
        role: Role,
        rooms: Vec<String>,
    },

    /// Client → Server: keepalive
    Heartbeat {
        #[serde(default)]
        timestamp: Option<i64>,
    },

    /// Server → Client: heartbeat acknowledged
    HeartbeatAck { timestamp: i64 },

    /// Server → Client: an event for one of the session's rooms
    Dispatch {
        event: String,
        data: serde_json::Value,
    },

    /// Server → Client: token rejected or expired; identify again
    InvalidSession,
}

/// What an identified connection is allowed to receive.
struct Identity {
    user_id: Uuid,
    rooms: Vec<Room>,
    expires_at: i64,
}

/// Build the gateway WebSocket router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/gateway", get(ws_handler))
        .with_state(Arc::new(state))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<GatewayState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

type WsSender = SplitSink<WebSocket, Message>;

/// Serialize and send one frame. `false` means the socket is gone.
async fn send(sender: &mut WsSender, message: &GatewayMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway frame: {e}");
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

/// Validate an `Identify` token and register the session.
async fn identify(
    state: &GatewayState,
    session_id: Uuid,
    token: &str,
) -> Option<(Identity, GatewayMessage)> {
    let claims = validate_token(token, state.jwt_secret.expose_secret())
        .ok()
        .filter(|c| c.is_access())?;
    let user_id = claims.sub.parse::<Uuid>().ok()?;
    let rooms = rooms_for(user_id, claims.role);

    state
        .sessions
        .register(
            session_id,
            Session {
                user_id,
                role: claims.role,
                rooms: rooms.clone(),
                identified_at: chrono::Utc::now(),
            },
        )
        .await;

    let ready = GatewayMessage::Ready {
        session_id,
        user_id,
        role: claims.role,
        rooms: rooms.iter().map(Room::to_string).collect(),
    };
    Some((
        Identity {
            user_id,
            rooms,
            expires_at: claims.exp,
        },
        ready,
    ))
}

/// Handle a single WebSocket connection.
async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut sender, mut receiver) = socket.split();
    let session_id = Uuid::now_v7();

    // Subscribe before Hello so nothing published after Ready is missed
    let mut events = state.broadcast.subscribe();

    let hello = GatewayMessage::Hello {
        heartbeat_interval: state.heartbeat_interval_ms,
    };
    if !send(&mut sender, &hello).await {
        return;
    }

    let mut identity: Option<Identity> = None;
    let mut reauth = tokio::time::interval_at(
        tokio::time::Instant::now() + state.reauth_interval,
        state.reauth_interval,
    );

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let Ok(message) = serde_json::from_str::<GatewayMessage>(&text) else {
                    debug!(session = %session_id, "Ignoring malformed gateway frame");
                    continue;
                };

                let reply = match message {
                    GatewayMessage::Identify { token } => {
                        match identify(&state, session_id, &token).await {
                            Some((who, ready)) => {
                                let active = state.sessions.active_count().await;
                                info!(
                                    session = %session_id,
                                    user_id = %who.user_id,
                                    active = active,
                                    "Gateway session identified"
                                );
                                identity = Some(who);
                                ready
                            }
                            None => {
                                if identity.take().is_some() {
                                    state.sessions.remove(session_id).await;
                                }
                                GatewayMessage::InvalidSession
                            }
                        }
                    }
                    GatewayMessage::Heartbeat { .. } => GatewayMessage::HeartbeatAck {
                        timestamp: chrono::Utc::now().timestamp_millis(),
                    },
                    // Server-only opcodes
                    _ => continue,
                };
                if !send(&mut sender, &reply).await {
                    break;
                }
            }

            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(session = %session_id, skipped, "Gateway session lagged; events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let subscribed = identity
                    .as_ref()
                    .is_some_and(|who| who.rooms.contains(&event.room));
                if !subscribed {
                    continue;
                }
                let dispatch = GatewayMessage::Dispatch {
                    event: event.event_type,
                    data: event.data,
                };
                if !send(&mut sender, &dispatch).await {
                    break;
                }
            }

            _ = reauth.tick() => {
                let expired = identity
                    .as_ref()
                    .is_some_and(|who| who.expires_at <= chrono::Utc::now().timestamp());
                if expired {
                    identity = None;
                    state.sessions.remove(session_id).await;
                    info!(session = %session_id, "Gateway token expired");
                    if !send(&mut sender, &GatewayMessage::InvalidSession).await {
                        break;
                    }
                }
            }
        }
    }

    // ── Cleanup ───────────────────────────────────────────────────────────────
    if let Some(session) = state.sessions.remove(session_id).await {
        let remaining = state.sessions.user_session_count(session.user_id).await;
        debug!(
            user_id = %session.user_id,
            remaining = remaining,
            "Gateway session closed"
        );
    }
    info!(session = %session_id, "Client disconnected from gateway");
}
