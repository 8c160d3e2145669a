//! Staff dashboard summary.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use rxdesk_common::error::RxResult;
use rxdesk_db::repository::dashboard::{self, DashboardStats};
use tracing::debug;

use super::with_staff;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    with_staff(
        &state,
        Router::new().route("/admin/dashboard", get(get_dashboard)),
    )
}

/// GET /api/admin/dashboard
///
/// Served from a short-lived cache; writes that move a count drop it.
async fn get_dashboard(State(state): State<Arc<AppState>>) -> RxResult<Json<DashboardStats>> {
    if let Some(stats) = state.caches.dashboard().await {
        return Ok(Json(DashboardStats::clone(&stats)));
    }

    let stats = Arc::new(
        dashboard::load_stats(&state.db.pg, state.config.dashboard.low_stock_threshold).await?,
    );
    debug!(
        pending_orders = stats.counts.pending_orders,
        low_stock = stats.low_stock.len(),
        "Dashboard stats loaded"
    );
    state.caches.store_dashboard(stats.clone()).await;
    Ok(Json(DashboardStats::clone(&stats)))
}
