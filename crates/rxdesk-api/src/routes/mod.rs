//! API route modules.
//!
//! Each module exposes `router(state)` and splits its endpoints into public,
//! authenticated, staff and admin groups; the helpers below attach the
//! matching middleware stack. Auth always runs before the role guard.

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use serde::Serialize;

use crate::{
    middleware::{optional_auth, require_admin, require_auth, require_staff},
    AppState,
};

pub mod appointments;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod contact;
pub mod dashboard;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod prescriptions;
pub mod refills;
pub mod settings;
pub mod transfers;
pub mod uploads;
pub mod users;
pub mod wordpress;

type ApiRouter = Router<Arc<AppState>>;

pub(crate) fn with_optional_auth(state: &Arc<AppState>, routes: ApiRouter) -> ApiRouter {
    routes.route_layer(from_fn_with_state(state.clone(), optional_auth))
}

pub(crate) fn with_auth(state: &Arc<AppState>, routes: ApiRouter) -> ApiRouter {
    routes.route_layer(from_fn_with_state(state.clone(), require_auth))
}

pub(crate) fn with_staff(state: &Arc<AppState>, routes: ApiRouter) -> ApiRouter {
    with_auth(state, routes.route_layer(from_fn(require_staff)))
}

pub(crate) fn with_admin(state: &Arc<AppState>, routes: ApiRouter) -> ApiRouter {
    with_auth(state, routes.route_layer(from_fn(require_admin)))
}

/// `{ "deleted": true }` / `{ "success": true }` style acknowledgements.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: &'static str) -> Self {
        Self {
            success: true,
            message: Some(message),
        }
    }
}
