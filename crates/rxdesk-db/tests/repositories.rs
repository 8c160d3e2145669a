//! Repository tests against a real PostgreSQL schema.
//!
//! Each test gets a fresh database with the migrations applied. They need a
//! reachable server in `DATABASE_URL`; run them with `cargo test -- --ignored`.

use rust_decimal::Decimal;
use rxdesk_common::{
    ids::generate_id,
    models::{
        notification::{Audience, NewNotification, NotificationKind},
        order::{Fulfillment, OrderStatus, PaymentStatus},
        user::{Role, User},
    },
    pricing::OrderTotals,
};
use rxdesk_db::{
    postgres::is_unique_violation,
    repository::{
        carts, notifications,
        orders::{self, NewOrder, NewOrderItem},
        products::{self, NewProduct},
        users::{self, NewUser},
    },
};
use sqlx::PgPool;
use uuid::Uuid;

async fn user(pool: &PgPool, email: &str, role: Role) -> User {
    users::create_user(
        pool,
        generate_id(),
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
}

async fn product(pool: &PgPool, slug: &str, stock: i32) -> Uuid {
    products::create_product(
        pool,
        generate_id(),
        NewProduct {
            category_id: None,
            name: slug,
            slug,
            sku: None,
            description: None,
            price: Decimal::new(1000, 2),
            sale_price: None,
            stock_quantity: stock,
            requires_prescription: false,
            image_url: None,
            is_active: true,
        },
    )
    .await
    .unwrap()
    .id
}

async fn stock_of(pool: &PgPool, product_id: Uuid) -> i32 {
    products::find_by_id(pool, product_id)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

/// Runs the same statements as checkout: lock lines, write the order,
/// decrement stock, clear the cart.
async fn check_out(pool: &PgPool, user_id: Uuid, order_number: &str) -> Uuid {
    let mut tx = pool.begin().await.unwrap();
    let lines = carts::lock_lines_for_checkout(&mut *tx, user_id).await.unwrap();
    assert!(!lines.is_empty());

    let subtotal: Decimal = lines
        .iter()
        .map(|l| l.price * Decimal::from(l.quantity))
        .sum();
    let totals = OrderTotals {
        subtotal,
        tax: Decimal::ZERO,
        shipping: Decimal::ZERO,
        total: subtotal,
    };
    let order = orders::insert_order(
        &mut *tx,
        NewOrder {
            id: generate_id(),
            order_number,
            user_id,
            fulfillment: Fulfillment::Pickup,
            totals: &totals,
            shipping_address: None,
            notes: None,
            prescription_id: None,
        },
    )
    .await
    .unwrap();

    for line in &lines {
        orders::insert_item(
            &mut *tx,
            order.id,
            &NewOrderItem {
                product_id: line.product_id,
                product_name: &line.name,
                unit_price: line.price,
                quantity: line.quantity,
                line_total: line.price * Decimal::from(line.quantity),
            },
        )
        .await
        .unwrap();
        orders::decrement_stock(&mut *tx, line.product_id, line.quantity)
            .await
            .unwrap();
    }
    carts::clear_for_user(&mut *tx, user_id).await.unwrap();
    tx.commit().await.unwrap();
    order.id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_email_is_unique_regardless_of_case(pool: PgPool) {
    user(&pool, "jane@example.com", Role::Customer).await;

    let err = users::create_user(
        &pool,
        generate_id(),
        NewUser {
            email: "JANE@example.com",
            password_hash: "not-a-real-hash",
            first_name: "Jane",
            last_name: "Again",
            phone: None,
            date_of_birth: None,
            role: Role::Customer,
        },
    )
    .await
    .unwrap_err();
    assert!(is_unique_violation(&err));

    let found = users::find_by_email(&pool, "Jane@Example.com").await.unwrap();
    assert_eq!(found.unwrap().email, "jane@example.com");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_takes_stock_and_empties_cart(pool: PgPool) {
    let buyer = user(&pool, "buyer@example.com", Role::Customer).await;
    let aspirin = product(&pool, "aspirin", 5).await;
    let bandages = product(&pool, "bandages", 2).await;

    let cart = carts::get_or_create(&pool, buyer.id).await.unwrap();
    carts::set_quantity(&pool, cart.id, aspirin, 3).await.unwrap();
    carts::set_quantity(&pool, cart.id, bandages, 2).await.unwrap();

    let order_id = check_out(&pool, buyer.id, "RX-TEST-0001").await;

    assert_eq!(stock_of(&pool, aspirin).await, 2);
    assert_eq!(stock_of(&pool, bandages).await, 0);
    assert!(carts::list_lines(&pool, cart.id).await.unwrap().is_empty());

    let items = orders::list_items(&pool, order_id).await.unwrap();
    assert_eq!(items.len(), 2);
    let order = orders::find_by_id(&pool, order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total, Decimal::new(5000, 2));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_stock_never_goes_negative(pool: PgPool) {
    let aspirin = product(&pool, "aspirin", 1).await;

    let mut tx = pool.begin().await.unwrap();
    let err = orders::decrement_stock(&mut *tx, aspirin, 2).await.unwrap_err();
    assert!(matches!(&err, sqlx::Error::Database(db) if db.is_check_violation()));
    drop(tx);

    assert_eq!(stock_of(&pool, aspirin).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cancel_restocks_what_the_order_took(pool: PgPool) {
    let buyer = user(&pool, "buyer@example.com", Role::Customer).await;
    let aspirin = product(&pool, "aspirin", 5).await;
    let cart = carts::get_or_create(&pool, buyer.id).await.unwrap();
    carts::set_quantity(&pool, cart.id, aspirin, 4).await.unwrap();
    let order_id = check_out(&pool, buyer.id, "RX-TEST-0002").await;
    assert_eq!(stock_of(&pool, aspirin).await, 1);

    let mut tx = pool.begin().await.unwrap();
    let order = orders::lock_order(&mut *tx, order_id).await.unwrap().unwrap();
    orders::restock_items(&mut *tx, order.id).await.unwrap();
    let order = orders::set_status(&mut *tx, order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&pool, aspirin).await, 5);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_delete_and_restock_share_one_transaction(pool: PgPool) {
    let buyer = user(&pool, "buyer@example.com", Role::Customer).await;
    let aspirin = product(&pool, "aspirin", 5).await;
    let cart = carts::get_or_create(&pool, buyer.id).await.unwrap();
    carts::set_quantity(&pool, cart.id, aspirin, 2).await.unwrap();
    let order_id = check_out(&pool, buyer.id, "RX-TEST-0003").await;

    // Rolled back: neither the restock nor the delete survives
    let mut tx = pool.begin().await.unwrap();
    orders::lock_order(&mut *tx, order_id).await.unwrap().unwrap();
    orders::restock_items(&mut *tx, order_id).await.unwrap();
    assert!(orders::delete_order(&mut *tx, order_id).await.unwrap());
    tx.rollback().await.unwrap();

    assert_eq!(stock_of(&pool, aspirin).await, 3);
    assert!(orders::find_by_id(&pool, order_id).await.unwrap().is_some());

    let mut tx = pool.begin().await.unwrap();
    orders::lock_order(&mut *tx, order_id).await.unwrap().unwrap();
    orders::restock_items(&mut *tx, order_id).await.unwrap();
    assert!(orders::delete_order(&mut *tx, order_id).await.unwrap());
    tx.commit().await.unwrap();

    assert_eq!(stock_of(&pool, aspirin).await, 5);
    assert!(orders::find_by_id(&pool, order_id).await.unwrap().is_none());
    assert!(orders::list_items(&pool, order_id).await.unwrap().is_empty());

    // A second delete finds nothing to lock, so nothing is restocked twice
    let mut tx = pool.begin().await.unwrap();
    assert!(orders::lock_order(&mut *tx, order_id).await.unwrap().is_none());
    assert!(!orders::delete_order(&mut *tx, order_id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_paid_moves_only_pending_orders_to_processing(pool: PgPool) {
    let buyer = user(&pool, "buyer@example.com", Role::Customer).await;
    let aspirin = product(&pool, "aspirin", 10).await;
    let cart = carts::get_or_create(&pool, buyer.id).await.unwrap();

    carts::set_quantity(&pool, cart.id, aspirin, 1).await.unwrap();
    let pending = check_out(&pool, buyer.id, "RX-TEST-0004").await;
    carts::set_quantity(&pool, cart.id, aspirin, 1).await.unwrap();
    let ready = check_out(&pool, buyer.id, "RX-TEST-0005").await;
    carts::set_quantity(&pool, cart.id, aspirin, 1).await.unwrap();
    let failing = check_out(&pool, buyer.id, "RX-TEST-0006").await;

    let order = orders::attach_payment_intent(&pool, pending, "pi_pending").await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    orders::attach_payment_intent(&pool, ready, "pi_ready").await.unwrap();
    orders::attach_payment_intent(&pool, failing, "pi_failing").await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    orders::set_status(&mut *tx, ready, OrderStatus::ReadyForPickup)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let order = orders::set_payment_status(&pool, "pi_pending", PaymentStatus::Paid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.status, OrderStatus::Processing);

    let order = orders::set_payment_status(&pool, "pi_ready", PaymentStatus::Paid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::ReadyForPickup);

    let order = orders::set_payment_status(&pool, "pi_failing", PaymentStatus::Failed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    assert_eq!(order.status, OrderStatus::Pending);

    assert!(orders::set_payment_status(&pool, "pi_unknown", PaymentStatus::Paid)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_notifications_are_scoped_to_their_audience(pool: PgPool) {
    let alice = user(&pool, "alice@example.com", Role::Customer).await;
    let bob = user(&pool, "bob@example.com", Role::Customer).await;
    let pharmacist = user(&pool, "rph@example.com", Role::Pharmacist).await;

    let for_alice = notifications::create_notification(
        &pool,
        generate_id(),
        &NewNotification::user(alice.id, NotificationKind::Order, "Order", "Ready"),
    )
    .await
    .unwrap();
    let for_bob = notifications::create_notification(
        &pool,
        generate_id(),
        &NewNotification::user(bob.id, NotificationKind::Refill, "Refill", "Ready"),
    )
    .await
    .unwrap();
    let for_staff = notifications::create_notification(
        &pool,
        generate_id(),
        &NewNotification::staff(NotificationKind::Order, "New order", "Placed"),
    )
    .await
    .unwrap();

    let (rows, total) = notifications::list_visible(&pool, alice.id, false, false, 50, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, for_alice.id);

    // Staff see the shared feed but not other people's personal items
    let (rows, total) = notifications::list_visible(&pool, pharmacist.id, true, false, 50, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, for_staff.id);
    assert_eq!(rows[0].audience, Audience::Staff);

    // Alice cannot touch Bob's or the staff feed
    assert!(notifications::mark_read(&pool, for_bob.id, alice.id, false)
        .await
        .unwrap()
        .is_none());
    assert!(!notifications::delete_notification(&pool, for_staff.id, alice.id, false)
        .await
        .unwrap());

    // The staff read flag is shared
    assert_eq!(notifications::mark_all_read(&pool, pharmacist.id, true).await.unwrap(), 1);
    let other_pharmacist = user(&pool, "rph2@example.com", Role::Pharmacist).await;
    assert_eq!(
        notifications::unread_count(&pool, other_pharmacist.id, true).await.unwrap(),
        0
    );
    assert_eq!(notifications::unread_count(&pool, bob.id, false).await.unwrap(), 1);

    let (rows, _) = notifications::list_visible(&pool, bob.id, false, true, 50, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_read);
}
