//! Order routes: checkout, order history, cancellation, staff fulfilment.
//!
//! Checkout and every cancellation run in one transaction with the affected
//! product rows locked, so stock never goes negative and a cancelled order
//! puts back exactly what it took.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use rxdesk_common::{
    error::{RxError, RxResult},
    gateway_event::event_types,
    ids,
    models::{
        cart::CartLine,
        notification::{NewNotification, NotificationKind},
        order::{
            CheckoutRequest, Fulfillment, Order, OrderFilter, OrderStatus, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        prescription::{Prescription, PrescriptionStatus},
    },
    pagination::{Page, Pagination},
    pricing::{compute_totals, effective_price, PricedLine},
    validation::validate_request,
};
use rxdesk_db::repository::{
    carts,
    orders::{self, NewOrder, NewOrderItem},
    prescriptions,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{with_admin, with_auth, with_staff, Ack};
use crate::{extract::JsonBody, middleware::AuthContext, AppState};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let customer = Router::new()
        .route("/orders", get(list_my_orders).post(checkout))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/cancel", post(cancel_order));

    let staff = Router::new()
        .route("/admin/orders", get(list_all_orders))
        .route("/admin/orders/{id}/status", put(update_status));

    let admin = Router::new().route("/admin/orders/{id}", delete(delete_order));

    with_auth(&state, customer)
        .merge(with_staff(&state, staff))
        .merge(with_admin(&state, admin))
}

/// Validate locked cart lines and price them at the current effective price.
fn price_lines(lines: &[CartLine]) -> RxResult<Vec<PricedLine>> {
    if lines.is_empty() {
        return Err(RxError::validation("Cart is empty"));
    }

    lines
        .iter()
        .map(|line| {
            if !line.is_active {
                return Err(RxError::validation(format!(
                    "'{}' is no longer available",
                    line.name
                )));
            }
            if line.stock_quantity < line.quantity {
                return Err(RxError::validation(format!(
                    "Only {} of '{}' in stock",
                    line.stock_quantity.max(0),
                    line.name
                )));
            }
            Ok(PricedLine {
                unit_price: effective_price(line.price, line.sale_price),
                quantity: line.quantity,
            })
        })
        .collect()
}

/// Prescription-only items need an approved prescription owned by the buyer.
fn check_prescription(
    lines: &[CartLine],
    prescription: Option<&Prescription>,
    user_id: Uuid,
) -> RxResult<()> {
    if !lines.iter().any(|l| l.requires_prescription) {
        return Ok(());
    }
    match prescription {
        None => Err(RxError::validation(
            "A prescription is required for one or more items in your cart",
        )),
        Some(p) if p.user_id != user_id => Err(RxError::validation("Prescription not found")),
        Some(p) if p.status != PrescriptionStatus::Approved => Err(RxError::validation(
            "Prescription has not been approved yet",
        )),
        Some(_) => Ok(()),
    }
}

async fn with_items(state: &AppState, order: Order) -> RxResult<OrderWithItems> {
    let items = orders::list_items(&state.db.pg, order.id).await?;
    Ok(OrderWithItems { order, items })
}

/// Tell the owner and staff that an order moved.
async fn announce(state: &AppState, order: &Order, customer_message: Option<String>) {
    state.broadcast_update(event_types::ORDER_UPDATE, Some(order.user_id), order);
    if let Some(message) = customer_message {
        state
            .notify(
                NewNotification::user(
                    order.user_id,
                    NotificationKind::Order,
                    format!("Order {}", order.order_number),
                    message,
                )
                .about("order", order.id),
            )
            .await;
    }
    state.dashboard_changed().await;
}

fn status_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Your order has been received.",
        OrderStatus::Processing => "Your order is being prepared.",
        OrderStatus::ReadyForPickup => "Your order is ready for pickup.",
        OrderStatus::Shipped => "Your order has shipped.",
        OrderStatus::Delivered => "Your order has been delivered.",
        OrderStatus::Cancelled => "Your order has been cancelled.",
        OrderStatus::Refunded => "Your order has been refunded.",
    }
}

/// POST /api/orders: check out the caller's cart.
async fn checkout(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CheckoutRequest>,
) -> RxResult<Json<OrderWithItems>> {
    validate_request(&body)?;

    let shipping_address = body
        .shipping_address
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if body.fulfillment == Fulfillment::Delivery && shipping_address.is_none() {
        return Err(RxError::validation("Shipping address is required for delivery"));
    }

    let prescription = match body.prescription_id {
        Some(id) => prescriptions::find_by_id(&state.db.pg, id).await?,
        None => None,
    };

    let mut tx = state.db.pg.begin().await?;

    let lines = carts::lock_lines_for_checkout(&mut *tx, auth.user_id).await?;
    let priced = price_lines(&lines)?;
    check_prescription(&lines, prescription.as_ref(), auth.user_id)?;

    let totals = compute_totals(&priced, body.fulfillment, &state.config.pricing);
    let order_number = ids::order_number(Utc::now());

    let order = orders::insert_order(
        &mut *tx,
        NewOrder {
            id: ids::generate_id(),
            order_number: &order_number,
            user_id: auth.user_id,
            fulfillment: body.fulfillment,
            totals: &totals,
            shipping_address: match body.fulfillment {
                Fulfillment::Delivery => shipping_address,
                Fulfillment::Pickup => None,
            },
            notes: body.notes.as_deref(),
            // Only carried when it was actually needed and checked
            prescription_id: prescription
                .as_ref()
                .filter(|_| lines.iter().any(|l| l.requires_prescription))
                .map(|p| p.id),
        },
    )
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for (line, priced) in lines.iter().zip(&priced) {
        let item = orders::insert_item(
            &mut *tx,
            order.id,
            &NewOrderItem {
                product_id: line.product_id,
                product_name: &line.name,
                unit_price: priced.unit_price,
                quantity: line.quantity,
                line_total: priced.line_total(),
            },
        )
        .await?;
        orders::decrement_stock(&mut *tx, line.product_id, line.quantity).await?;
        items.push(item);
    }

    carts::clear_for_user(&mut *tx, auth.user_id).await?;
    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        user_id = %auth.user_id,
        total = %order.total,
        "Order placed"
    );

    state
        .notify(
            NewNotification::staff(
                NotificationKind::Order,
                "New order",
                format!(
                    "Order {} placed ({} item(s), total {})",
                    order.order_number,
                    items.len(),
                    order.total
                ),
            )
            .about("order", order.id),
        )
        .await;
    announce(&state, &order, None).await;

    Ok(Json(OrderWithItems { order, items }))
}

/// GET /api/orders: the caller's orders.
async fn list_my_orders(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<OrderFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<Order>>> {
    let (rows, total) = orders::list_orders(
        &state.db.pg,
        Some(auth.user_id),
        &filter,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// GET /api/orders/{id}: owner or staff.
async fn get_order(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<OrderWithItems>> {
    let order = orders::find_by_id(&state.db.pg, id)
        .await?
        .filter(|o| auth.can_access(Some(o.user_id)))
        .ok_or_else(|| RxError::not_found("Order"))?;
    Ok(Json(with_items(&state, order).await?))
}

/// POST /api/orders/{id}/cancel: owner, pending orders only.
async fn cancel_order(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<OrderWithItems>> {
    let mut tx = state.db.pg.begin().await?;

    let order = orders::lock_order(&mut *tx, id)
        .await?
        .filter(|o| o.user_id == auth.user_id)
        .ok_or_else(|| RxError::not_found("Order"))?;

    if order.status != OrderStatus::Pending {
        return Err(RxError::validation("Only pending orders can be cancelled"));
    }

    orders::restock_items(&mut *tx, order.id).await?;
    let order = orders::set_status(&mut *tx, order.id, OrderStatus::Cancelled).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, user_id = %auth.user_id, "Order cancelled by customer");

    state
        .notify(
            NewNotification::staff(
                NotificationKind::Order,
                "Order cancelled",
                format!("Order {} was cancelled by the customer", order.order_number),
            )
            .about("order", order.id),
        )
        .await;
    announce(&state, &order, None).await;

    Ok(Json(with_items(&state, order).await?))
}

/// GET /api/admin/orders
async fn list_all_orders(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<OrderFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<Order>>> {
    let (rows, total) = orders::list_orders(
        &state.db.pg,
        None,
        &filter,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// PUT /api/admin/orders/{id}/status
async fn update_status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateOrderStatusRequest>,
) -> RxResult<Json<OrderWithItems>> {
    let mut tx = state.db.pg.begin().await?;

    let order = orders::lock_order(&mut *tx, id)
        .await?
        .ok_or_else(|| RxError::not_found("Order"))?;

    if order.status == body.status {
        tx.rollback().await?;
        return Ok(Json(with_items(&state, order).await?));
    }
    if !order.status.can_transition_to(body.status) {
        return Err(RxError::validation(format!(
            "Cannot change order status from {} to {}",
            order.status.as_str(),
            body.status.as_str()
        )));
    }

    if body.status == OrderStatus::Cancelled {
        orders::restock_items(&mut *tx, order.id).await?;
    }
    let order = orders::set_status(&mut *tx, order.id, body.status).await?;
    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        staff_id = %auth.user_id,
        status = order.status.as_str(),
        "Order status updated"
    );

    announce(&state, &order, Some(status_message(order.status).to_string())).await;
    Ok(Json(with_items(&state, order).await?))
}

/// DELETE /api/admin/orders/{id}
///
/// Orders that still hold stock (not yet shipped or collected) restock it.
async fn delete_order(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    let mut tx = state.db.pg.begin().await?;

    let order = orders::lock_order(&mut *tx, id)
        .await?
        .ok_or_else(|| RxError::not_found("Order"))?;

    if matches!(
        order.status,
        OrderStatus::Pending | OrderStatus::Processing | OrderStatus::ReadyForPickup
    ) {
        orders::restock_items(&mut *tx, order.id).await?;
    }
    orders::delete_order(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!(order_id = %id, admin_id = %auth.user_id, "Order deleted");
    state.dashboard_changed().await;
    Ok(Json(Ack::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn line(name: &str, quantity: i32, stock: i32, rx: bool) -> CartLine {
        CartLine {
            id: Uuid::now_v7(),
            product_id: Uuid::now_v7(),
            quantity,
            name: name.into(),
            slug: name.to_lowercase(),
            image_url: None,
            price: Decimal::new(1000, 2),
            sale_price: Some(Decimal::new(800, 2)),
            stock_quantity: stock,
            requires_prescription: rx,
            is_active: true,
        }
    }

    fn prescription(user_id: Uuid, status: PrescriptionStatus) -> Prescription {
        let now = Utc::now();
        Prescription {
            id: Uuid::now_v7(),
            user_id,
            patient_name: "Jane Doe".into(),
            date_of_birth: None,
            doctor_name: None,
            doctor_phone: None,
            medication: Some("Amoxicillin".into()),
            dosage: None,
            file_path: "prescriptions/x.pdf".into(),
            original_filename: "x.pdf".into(),
            content_type: "application/pdf".into(),
            status,
            pharmacist_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_unknown_fulfillment_is_a_validation_error() {
        use crate::test_support::{access_token, json_body, send, test_router};
        use axum::{
            body::Body,
            http::{header, Request, StatusCode},
        };
        use rxdesk_common::models::user::Role;

        let request = Request::post("/api/orders")
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token(Role::Customer)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"fulfillment":"teleport"}"#))
            .unwrap();
        let response = send(test_router(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().contains("teleport"));
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let err = price_lines(&[]).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Cart is empty");
    }

    #[test]
    fn test_stock_and_availability_checks() {
        let err = price_lines(&[line("Cough Syrup", 3, 2, false)]).unwrap_err();
        assert!(err.to_string().contains("Only 2 of 'Cough Syrup' in stock"));

        let mut inactive = line("Discontinued", 1, 10, false);
        inactive.is_active = false;
        assert!(price_lines(&[inactive]).is_err());

        let priced = price_lines(&[line("Vitamin D", 2, 2, false)]).unwrap();
        assert_eq!(priced[0].unit_price, Decimal::new(800, 2));
        assert_eq!(priced[0].line_total(), Decimal::new(1600, 2));
    }

    #[test]
    fn test_prescription_rules() {
        let me = Uuid::now_v7();
        let otc = [line("Vitamin D", 1, 5, false)];
        let rx = [line("Amoxicillin", 1, 5, true)];

        assert!(check_prescription(&otc, None, me).is_ok());
        assert!(check_prescription(&rx, None, me).is_err());
        assert!(check_prescription(&rx, Some(&prescription(me, PrescriptionStatus::Pending)), me).is_err());
        assert!(
            check_prescription(&rx, Some(&prescription(Uuid::now_v7(), PrescriptionStatus::Approved)), me)
                .is_err()
        );
        assert!(check_prescription(&rx, Some(&prescription(me, PrescriptionStatus::Approved)), me).is_ok());
    }

    #[sqlx::test(migrations = "../rxdesk-db/migrations")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_prescription_gated_checkout_and_restocking_delete(pool: sqlx::PgPool) {
        use crate::test_support::{access_token, access_token_for, json_body, router_over, send};
        use axum::{
            body::Body,
            http::{header, Request, StatusCode},
        };
        use rxdesk_common::models::user::Role;
        use rxdesk_db::repository::{
            carts,
            prescriptions::NewPrescription,
            products::{self, NewProduct},
            users::{self, NewUser},
        };

        async fn account(pool: &sqlx::PgPool, email: &str, role: Role) -> Uuid {
            users::create_user(
                pool,
                ids::generate_id(),
                NewUser {
                    email,
                    password_hash: "not-a-real-hash",
                    first_name: "Test",
                    last_name: "User",
                    phone: None,
                    date_of_birth: None,
                    role,
                },
            )
            .await
            .unwrap()
            .id
        }

        async fn stock(pool: &sqlx::PgPool, id: Uuid) -> i32 {
            products::find_by_id(pool, id).await.unwrap().unwrap().stock_quantity
        }

        let buyer = account(&pool, "buyer@example.com", Role::Customer).await;
        let pharmacist = account(&pool, "rph@example.com", Role::Pharmacist).await;
        let amoxicillin = products::create_product(
            &pool,
            ids::generate_id(),
            NewProduct {
                category_id: None,
                name: "Amoxicillin 500mg",
                slug: "amoxicillin-500mg",
                sku: None,
                description: None,
                price: Decimal::new(1250, 2),
                sale_price: None,
                stock_quantity: 3,
                requires_prescription: true,
                image_url: None,
                is_active: true,
            },
        )
        .await
        .unwrap()
        .id;
        let cart = carts::get_or_create(&pool, buyer).await.unwrap();
        carts::set_quantity(&pool, cart.id, amoxicillin, 2).await.unwrap();

        let router = router_over(pool.clone());
        let buyer_token = access_token_for(buyer, Role::Customer);
        let checkout = |body: serde_json::Value| {
            Request::post("/api/orders")
                .header(header::AUTHORIZATION, format!("Bearer {buyer_token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let response = send(router.clone(), checkout(serde_json::json!({"fulfillment": "pickup"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().contains("prescription is required"));

        let rx = prescriptions::create_prescription(
            &pool,
            ids::generate_id(),
            NewPrescription {
                user_id: buyer,
                patient_name: "Test User",
                date_of_birth: None,
                doctor_name: None,
                doctor_phone: None,
                medication: Some("Amoxicillin"),
                dosage: None,
                file_path: "prescriptions/test.pdf",
                original_filename: "test.pdf",
                content_type: "application/pdf",
            },
        )
        .await
        .unwrap();
        let with_rx = serde_json::json!({"fulfillment": "pickup", "prescription_id": rx.id});

        let response = send(router.clone(), checkout(with_rx.clone())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().contains("not been approved"));
        assert_eq!(stock(&pool, amoxicillin).await, 3);

        prescriptions::review(&pool, rx.id, PrescriptionStatus::Approved, None, pharmacist)
            .await
            .unwrap();

        let response = send(router.clone(), checkout(with_rx)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let order = json_body(response).await;
        assert_eq!(order["status"], "pending");
        assert_eq!(order["prescription_id"], rx.id.to_string());
        assert_eq!(order["items"].as_array().unwrap().len(), 1);
        assert_eq!(stock(&pool, amoxicillin).await, 1);
        assert!(carts::list_lines(&pool, cart.id).await.unwrap().is_empty());

        // Deleting a pending order puts its stock back exactly once
        let delete = || {
            Request::delete(format!("/api/admin/orders/{}", order["id"].as_str().unwrap()))
                .header(header::AUTHORIZATION, format!("Bearer {}", access_token(Role::Admin)))
                .body(Body::empty())
                .unwrap()
        };
        let response = send(router.clone(), delete()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(stock(&pool, amoxicillin).await, 3);

        let response = send(router, delete()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(stock(&pool, amoxicillin).await, 3);
    }
}
