//! Site settings: a public map for the storefront and admin CRUD.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use rxdesk_common::{
    error::{RxError, RxResult},
    models::settings::{public_map, Setting, UpsertSettingsRequest},
    validation::validate_request,
};
use rxdesk_db::repository::settings;
use std::sync::Arc;

use super::{with_admin, Ack};
use crate::{extract::JsonBody, AppState};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new().route("/settings/public", get(public_settings));
    let admin = Router::new()
        .route("/admin/settings", get(list_settings).put(upsert_settings))
        .route("/admin/settings/{key}", delete(delete_setting));

    public.merge(with_admin(&state, admin))
}

/// GET /api/settings/public
async fn public_settings(
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<HashMap<String, serde_json::Value>>> {
    let rows = settings::list_public(&state.db.pg).await?;
    Ok(Json(public_map(rows)))
}

/// GET /api/admin/settings
async fn list_settings(State(state): State<Arc<AppState>>) -> RxResult<Json<Vec<Setting>>> {
    Ok(Json(settings::list_all(&state.db.pg).await?))
}

/// PUT /api/admin/settings
async fn upsert_settings(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<UpsertSettingsRequest>,
) -> RxResult<Json<Vec<Setting>>> {
    validate_request(&body)?;
    let saved = settings::upsert_many(&state.db.pg, &body.settings).await?;
    tracing::info!(count = saved.len(), "Settings updated");
    Ok(Json(saved))
}

/// DELETE /api/admin/settings/{key}
async fn delete_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> RxResult<Json<Ack>> {
    if !settings::delete_setting(&state.db.pg, &key).await? {
        return Err(RxError::not_found("Setting"));
    }
    tracing::info!(key = %key, "Setting deleted");
    Ok(Json(Ack::ok()))
}
