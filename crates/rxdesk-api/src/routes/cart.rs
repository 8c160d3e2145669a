//! Shopping cart routes. Every endpoint acts on the caller's own cart.

use axum::{
    extract::{Extension, Path, State},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use rxdesk_common::{
    error::{RxError, RxResult},
    models::{
        cart::{AddCartItemRequest, CartLine, CartLineResponse, CartResponse, UpdateCartItemRequest},
        catalog::Product,
    },
    pricing::{effective_price, PricedLine},
    validation::validate_request,
};
use rxdesk_db::repository::{carts, products};
use std::sync::Arc;
use uuid::Uuid;

use super::with_auth;
use crate::{extract::JsonBody, middleware::AuthContext, AppState};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    with_auth(
        &state,
        Router::new()
            .route("/cart", get(get_cart).delete(clear_cart))
            .route("/cart/items", post(add_item))
            .route(
                "/cart/items/{product_id}",
                put(update_item).delete(remove_item),
            ),
    )
}

/// Price each line at the current effective price.
pub(crate) fn summarize(lines: Vec<CartLine>) -> CartResponse {
    let items: Vec<CartLineResponse> = lines
        .into_iter()
        .map(|line| {
            let unit_price = effective_price(line.price, line.sale_price);
            let line_total = PricedLine {
                unit_price,
                quantity: line.quantity,
            }
            .line_total();
            CartLineResponse {
                line,
                unit_price,
                line_total,
            }
        })
        .collect();

    CartResponse {
        item_count: items.iter().map(|i| i64::from(i.line.quantity)).sum(),
        subtotal: items.iter().map(|i| i.line_total).sum::<Decimal>(),
        items,
    }
}

/// An active product with at least `quantity` units on hand.
async fn available_product(state: &AppState, product_id: Uuid, quantity: i32) -> RxResult<Product> {
    let product = products::find_by_id(&state.db.pg, product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| RxError::not_found("Product"))?;

    if !product.in_stock(quantity) {
        return Err(RxError::validation(format!(
            "Only {} of '{}' in stock",
            product.stock_quantity.max(0),
            product.name
        )));
    }
    Ok(product)
}

async fn load_cart(state: &AppState, user_id: Uuid) -> RxResult<CartResponse> {
    let cart = carts::get_or_create(&state.db.pg, user_id).await?;
    let lines = carts::list_lines(&state.db.pg, cart.id).await?;
    Ok(summarize(lines))
}

/// GET /api/cart
async fn get_cart(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<CartResponse>> {
    Ok(Json(load_cart(&state, auth.user_id).await?))
}

/// POST /api/cart/items: adds to any quantity already in the cart.
async fn add_item(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<AddCartItemRequest>,
) -> RxResult<Json<CartResponse>> {
    validate_request(&body)?;

    let cart = carts::get_or_create(&state.db.pg, auth.user_id).await?;
    let current = carts::line_quantity(&state.db.pg, cart.id, body.product_id).await?;
    let quantity = current.saturating_add(body.quantity);

    available_product(&state, body.product_id, quantity).await?;
    carts::set_quantity(&state.db.pg, cart.id, body.product_id, quantity).await?;

    Ok(Json(summarize(carts::list_lines(&state.db.pg, cart.id).await?)))
}

/// PUT /api/cart/items/{product_id}: sets the quantity; 0 removes the line.
async fn update_item(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateCartItemRequest>,
) -> RxResult<Json<CartResponse>> {
    validate_request(&body)?;

    let cart = carts::get_or_create(&state.db.pg, auth.user_id).await?;
    if body.quantity == 0 {
        carts::remove_line(&state.db.pg, cart.id, product_id).await?;
    } else {
        available_product(&state, product_id, body.quantity).await?;
        carts::set_quantity(&state.db.pg, cart.id, product_id, body.quantity).await?;
    }

    Ok(Json(summarize(carts::list_lines(&state.db.pg, cart.id).await?)))
}

/// DELETE /api/cart/items/{product_id}
async fn remove_item(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> RxResult<Json<CartResponse>> {
    let cart = carts::get_or_create(&state.db.pg, auth.user_id).await?;
    if !carts::remove_line(&state.db.pg, cart.id, product_id).await? {
        return Err(RxError::not_found("Cart item"));
    }
    Ok(Json(summarize(carts::list_lines(&state.db.pg, cart.id).await?)))
}

/// DELETE /api/cart
async fn clear_cart(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<CartResponse>> {
    let cart = carts::get_or_create(&state.db.pg, auth.user_id).await?;
    carts::clear(&state.db.pg, cart.id).await?;
    Ok(Json(summarize(Vec::new())))
}
