//! WordPress blog content and the WooCommerce catalogue push.
//!
//! Connection settings are stored in the database, so a client is built
//! from the current row for each call.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use rxdesk_common::{
    error::{RxError, RxResult},
    models::wordpress::{
        ProductSyncReport, UpdateWordPressSettingsRequest, WordPressSettings,
        WordPressSettingsResponse,
    },
    validation::validate_request,
};
use rxdesk_db::repository::{products, wordpress};
use rxdesk_integrations::{
    signature,
    wordpress::{Post, PostPage, WcProductPayload, WordPressClient, WpUser},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{with_admin, Ack};
use crate::{
    cache::{ContentKey, ContentValue},
    extract::JsonBody,
    AppState,
};

const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/wordpress/posts", get(list_posts))
        .route("/wordpress/posts/{id}", get(get_post))
        .route("/wordpress/webhook", post(woocommerce_webhook));

    let admin = Router::new()
        .route(
            "/admin/wordpress/settings",
            get(get_settings).put(update_settings),
        )
        .route("/admin/wordpress/test", post(test_connection))
        .route("/admin/wordpress/sync/products", post(sync_products))
        .route("/admin/wordpress/cache/clear", post(clear_cache));

    public.merge(with_admin(&state, admin))
}

#[derive(Debug, Deserialize)]
struct PostsQuery {
    page: Option<u32>,
    per_page: Option<u32>,
}

impl PostsQuery {
    /// `(page, per_page)` with defaults applied and bounds enforced.
    fn normalized(&self) -> (u32, u32) {
        (
            self.page.unwrap_or(1).max(1),
            self.per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        )
    }
}

/// Client for the blog, or 503 while the integration is off.
async fn content_client(state: &AppState) -> RxResult<WordPressClient> {
    let settings = wordpress::get_settings(&state.db.pg).await?;
    if !settings.sync_posts {
        return Err(RxError::ServiceUnavailable {
            service: "WordPress".into(),
        });
    }
    Ok(WordPressClient::from_settings(state.http.clone(), &settings)?)
}

// ── Public content ────────────────────────────────────────────────────────────

/// GET /api/wordpress/posts?page=&per_page=
async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostsQuery>,
) -> RxResult<Json<PostPage>> {
    let (page, per_page) = query.normalized();
    let key = ContentKey::Posts { page, per_page };
    if let Some(ContentValue::Posts(cached)) = state.caches.content.get(&key).await {
        return Ok(Json(cached));
    }

    let fetched = content_client(&state).await?.list_posts(page, per_page).await?;
    state
        .caches
        .content
        .insert(key, ContentValue::Posts(fetched.clone()))
        .await;
    Ok(Json(fetched))
}

/// GET /api/wordpress/posts/{id}
async fn get_post(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> RxResult<Json<Post>> {
    let key = ContentKey::Post(id);
    if let Some(ContentValue::Post(post)) = state.caches.content.get(&key).await {
        return Ok(Json(*post));
    }

    let post = match content_client(&state).await?.get_post(id).await {
        Ok(post) => post,
        Err(e) if e.is_not_found() => return Err(RxError::not_found("Post")),
        Err(e) => return Err(e.into()),
    };
    state
        .caches
        .content
        .insert(key, ContentValue::Post(Box::new(post.clone())))
        .await;
    Ok(Json(post))
}

/// POST /api/wordpress/webhook
///
/// WooCommerce calls this when store content changes; a verified call
/// drops the content cache.
async fn woocommerce_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> RxResult<Json<Ack>> {
    let settings = wordpress::get_settings(&state.db.pg).await?;
    if settings.webhook_secret.is_empty() {
        return Err(RxError::ServiceUnavailable {
            service: "WooCommerce webhooks".into(),
        });
    }

    let verified = headers
        .get("x-wc-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .map(|sig| signature::verify_woocommerce(sig, &body, &settings.webhook_secret));
    match verified {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            warn!("Rejected WooCommerce webhook: {e}");
            return Err(RxError::Unauthorized);
        }
        None => {
            warn!("WooCommerce webhook without signature");
            return Err(RxError::Unauthorized);
        }
    }

    let topic = headers
        .get("x-wc-webhook-topic")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    info!(topic, "WooCommerce webhook received; clearing content cache");
    state.caches.clear_content().await;

    Ok(Json(Ack::ok()))
}

// ── Admin ─────────────────────────────────────────────────────────────────────

/// GET /api/admin/wordpress/settings
async fn get_settings(State(state): State<Arc<AppState>>) -> RxResult<Json<WordPressSettingsResponse>> {
    Ok(Json(wordpress::get_settings(&state.db.pg).await?.into()))
}

/// PUT /api/admin/wordpress/settings
async fn update_settings(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<UpdateWordPressSettingsRequest>,
) -> RxResult<Json<WordPressSettingsResponse>> {
    validate_request(&body)?;

    let current = wordpress::get_settings(&state.db.pg).await?;
    let saved = wordpress::save_settings(&state.db.pg, &body.apply(current)).await?;
    state.caches.clear_content().await;

    info!(enabled = saved.enabled, site_url = %saved.site_url, "WordPress settings updated");
    Ok(Json(saved.into()))
}

/// POST /api/admin/wordpress/test
async fn test_connection(State(state): State<Arc<AppState>>) -> RxResult<Json<WpUser>> {
    let settings = wordpress::get_settings(&state.db.pg).await?;
    let client = WordPressClient::from_settings(state.http.clone(), &settings)?;
    let user = client.current_user().await?;
    info!(wp_user = %user.name, "WordPress connection verified");
    Ok(Json(user))
}

/// POST /api/admin/wordpress/sync/products
///
/// Creates WooCommerce products for anything not yet pushed and updates the
/// rest. One failing product does not stop the run.
async fn sync_products(State(state): State<Arc<AppState>>) -> RxResult<Json<ProductSyncReport>> {
    let settings: WordPressSettings = wordpress::get_settings(&state.db.pg).await?;
    if !settings.sync_products {
        return Err(RxError::validation("Product sync is disabled in the WordPress settings"));
    }
    if !settings.has_woocommerce_keys() {
        return Err(RxError::validation("WooCommerce consumer key and secret are required"));
    }
    let client = WordPressClient::from_settings(state.http.clone(), &settings)?;

    let mut report = ProductSyncReport::default();
    for product in products::list_active(&state.db.pg).await? {
        let payload = WcProductPayload::from_product(&product, &state.config.server.public_url);
        let result = match product.wc_product_id {
            Some(wc_id) => client.update_product(wc_id, &payload).await.map(|_| false),
            None => match client.create_product(&payload).await {
                Ok(created) => {
                    products::set_wc_product_id(&state.db.pg, product.id, created.id).await?;
                    Ok(true)
                }
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(true) => report.created += 1,
            Ok(false) => report.updated += 1,
            Err(e) => {
                warn!(product_id = %product.id, "WooCommerce sync failed: {e}");
                report.failed += 1;
            }
        }
    }

    wordpress::touch_last_sync(&state.db.pg).await?;
    info!(
        created = report.created,
        updated = report.updated,
        failed = report.failed,
        "WooCommerce product sync finished"
    );
    Ok(Json(report))
}

/// POST /api/admin/wordpress/cache/clear
async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<Ack> {
    state.caches.clear_content().await;
    info!("WordPress content cache cleared");
    Json(Ack::with_message("Content cache cleared"))
}
