//! Card payments and refill subscriptions through Stripe.
//!
//! Every endpoint except `/payments/config` answers 503 while no Stripe
//! secret key is configured. The webhook only needs the signing secret.

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use rxdesk_common::{
    error::{RxError, RxResult},
    gateway_event::event_types,
    ids,
    models::{
        notification::{NewNotification, NotificationKind},
        order::{Order, OrderStatus, PaymentStatus},
        subscription::{
            CreatePaymentIntentRequest, CreateSubscriptionRequest, PaymentIntentResponse,
            Subscription,
        },
    },
    pricing::to_minor_units,
    validation::validate_request,
};
use rxdesk_db::repository::{orders, subscriptions, users};
use rxdesk_integrations::{
    signature,
    stripe::{self, Charge, PaymentIntent, StripeClient, StripeSubscription},
};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{with_auth, Ack};
use crate::{extract::JsonBody, middleware::AuthContext, AppState};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/payments/config", get(payment_config))
        .route("/payments/webhook", post(stripe_webhook));

    let customer = Router::new()
        .route("/payments/intent", post(create_payment_intent))
        .route(
            "/payments/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route("/payments/subscriptions/{id}", delete(cancel_subscription));

    public.merge(with_auth(&state, customer))
}

#[derive(Debug, Serialize)]
struct PaymentConfig {
    enabled: bool,
    publishable_key: Option<String>,
    currency: String,
}

fn stripe_client(state: &AppState) -> RxResult<&StripeClient> {
    state.stripe.as_ref().ok_or_else(|| RxError::ServiceUnavailable {
        service: "Payments".into(),
    })
}

/// The caller's Stripe customer id, creating the customer on first use.
async fn ensure_customer(state: &AppState, stripe: &StripeClient, user_id: Uuid) -> RxResult<String> {
    let user = users::find_by_id(&state.db.pg, user_id)
        .await?
        .ok_or_else(|| RxError::not_found("User"))?;

    if let Some(id) = user.stripe_customer_id {
        return Ok(id);
    }

    let customer = stripe
        .create_customer(&user.email, &user.full_name(), &user.id.to_string())
        .await?;
    users::set_stripe_customer(&state.db.pg, user.id, &customer.id).await?;
    info!(user_id = %user.id, customer_id = %customer.id, "Stripe customer linked");
    Ok(customer.id)
}

/// GET /api/payments/config
async fn payment_config(State(state): State<Arc<AppState>>) -> Json<PaymentConfig> {
    Json(PaymentConfig {
        enabled: state.stripe.is_some(),
        publishable_key: state.config.payments.publishable_key.clone(),
        currency: state.config.pricing.currency.clone(),
    })
}

/// POST /api/payments/intent
async fn create_payment_intent(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreatePaymentIntentRequest>,
) -> RxResult<Json<PaymentIntentResponse>> {
    let stripe = stripe_client(&state)?;

    let order = orders::find_by_id(&state.db.pg, body.order_id)
        .await?
        .filter(|o| o.user_id == auth.user_id)
        .ok_or_else(|| RxError::not_found("Order"))?;

    if order.status == OrderStatus::Cancelled {
        return Err(RxError::validation("Cancelled orders cannot be paid"));
    }
    if !order.payment_status.accepts_payment() {
        return Err(RxError::validation(format!(
            "Order {} does not accept payment",
            order.order_number
        )));
    }

    let amount = to_minor_units(order.total)
        .filter(|a| *a > 0)
        .ok_or_else(|| RxError::validation("Order total is not payable"))?;
    let currency = &state.config.pricing.currency;

    let customer_id = ensure_customer(&state, stripe, auth.user_id).await?;
    let intent = stripe
        .create_payment_intent(
            amount,
            currency,
            &customer_id,
            &order.id.to_string(),
            &order.order_number,
        )
        .await?;

    let client_secret = intent.client_secret.clone().ok_or_else(|| RxError::Upstream {
        service: "stripe".into(),
        message: "payment intent has no client secret".into(),
    })?;

    orders::attach_payment_intent(&state.db.pg, order.id, &intent.id).await?;
    info!(
        order_id = %order.id,
        payment_intent_id = %intent.id,
        amount,
        "Payment intent created"
    );

    Ok(Json(PaymentIntentResponse {
        client_secret,
        payment_intent_id: intent.id,
        amount: intent.amount,
        currency: intent.currency,
    }))
}

/// POST /api/payments/subscriptions
async fn create_subscription(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreateSubscriptionRequest>,
) -> RxResult<Json<Subscription>> {
    let stripe = stripe_client(&state)?;
    validate_request(&body)?;

    let customer_id = ensure_customer(&state, stripe, auth.user_id).await?;
    let remote = stripe.create_subscription(&customer_id, body.price_id.trim()).await?;

    let subscription = subscriptions::create_subscription(
        &state.db.pg,
        ids::generate_id(),
        auth.user_id,
        &remote.id,
        body.price_id.trim(),
        &remote.status,
        remote.period_end(),
    )
    .await?;

    info!(
        user_id = %auth.user_id,
        subscription_id = %remote.id,
        status = %remote.status,
        "Subscription created"
    );
    Ok(Json(subscription))
}

/// GET /api/payments/subscriptions
async fn list_subscriptions(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> RxResult<Json<Vec<Subscription>>> {
    stripe_client(&state)?;
    Ok(Json(subscriptions::list_for_user(&state.db.pg, auth.user_id).await?))
}

/// DELETE /api/payments/subscriptions/{id}: cancels at period end.
async fn cancel_subscription(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Subscription>> {
    let stripe = stripe_client(&state)?;

    let subscription = subscriptions::find_by_id(&state.db.pg, id)
        .await?
        .filter(|s| s.user_id == auth.user_id)
        .ok_or_else(|| RxError::not_found("Subscription"))?;

    let remote = stripe
        .cancel_subscription_at_period_end(&subscription.stripe_subscription_id)
        .await?;

    info!(user_id = %auth.user_id, subscription_id = %remote.id, "Subscription set to cancel");
    sync_subscription(&state, &remote)
        .await?
        .map(Json)
        .ok_or_else(|| RxError::not_found("Subscription"))
}

async fn sync_subscription(
    state: &AppState,
    remote: &StripeSubscription,
) -> RxResult<Option<Subscription>> {
    Ok(subscriptions::sync_status(
        &state.db.pg,
        &remote.id,
        &remote.status,
        remote.period_end(),
        remote.cancel_at_period_end,
    )
    .await?)
}

// ── Webhook ───────────────────────────────────────────────────────────────────

/// POST /api/payments/webhook
async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> RxResult<Json<Ack>> {
    let secret = state
        .config
        .payments
        .webhook_secret
        .as_ref()
        .ok_or_else(|| RxError::ServiceUnavailable {
            service: "Payment webhooks".into(),
        })?;

    let header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RxError::validation("Missing Stripe-Signature header"))?;

    if let Err(e) = signature::verify_stripe(
        header,
        &body,
        secret.expose_secret(),
        Utc::now().timestamp(),
    ) {
        warn!("Rejected Stripe webhook: {e}");
        return Err(e.into());
    }

    let event = stripe::parse_event(&body)?;
    debug!(event_id = %event.id, event_type = %event.event_type, "Stripe webhook received");

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let intent: PaymentIntent = event.object()?;
            record_payment(&state, &intent.id, PaymentStatus::Paid).await?;
        }
        "payment_intent.payment_failed" => {
            let intent: PaymentIntent = event.object()?;
            record_payment(&state, &intent.id, PaymentStatus::Failed).await?;
        }
        "charge.refunded" => {
            let charge: Charge = event.object()?;
            match charge.payment_intent {
                Some(intent_id) => {
                    record_payment(&state, &intent_id, PaymentStatus::Refunded).await?;
                }
                None => debug!(charge_id = %charge.id, "Refunded charge has no payment intent"),
            }
        }
        "customer.subscription.updated" | "customer.subscription.deleted" => {
            let remote: StripeSubscription = event.object()?;
            if sync_subscription(&state, &remote).await?.is_none() {
                debug!(subscription_id = %remote.id, "Webhook for unknown subscription");
            }
        }
        other => debug!(event_type = other, "Ignoring Stripe event"),
    }

    Ok(Json(Ack::ok()))
}

fn payment_message(order: &Order) -> Option<(&'static str, String)> {
    match order.payment_status {
        PaymentStatus::Paid => Some((
            "Payment received",
            format!("We received your payment for order {}.", order.order_number),
        )),
        PaymentStatus::Failed => Some((
            "Payment failed",
            format!(
                "Your payment for order {} did not go through. Please try again.",
                order.order_number
            ),
        )),
        PaymentStatus::Refunded => Some((
            "Refund issued",
            format!("Your payment for order {} was refunded.", order.order_number),
        )),
        PaymentStatus::Unpaid | PaymentStatus::Pending => None,
    }
}

async fn record_payment(state: &AppState, payment_intent_id: &str, status: PaymentStatus) -> RxResult<()> {
    let Some(order) = orders::set_payment_status(&state.db.pg, payment_intent_id, status).await? else {
        warn!(payment_intent_id, "Payment event for unknown order");
        return Ok(());
    };

    info!(
        order_id = %order.id,
        payment_status = ?order.payment_status,
        status = ?order.status,
        "Order payment updated"
    );

    if let Some((title, message)) = payment_message(&order) {
        state
            .notify(
                NewNotification::user(order.user_id, NotificationKind::Payment, title, message)
                    .about("order", order.id),
            )
            .await;
    }
    if status == PaymentStatus::Paid {
        state
            .notify(
                NewNotification::staff(
                    NotificationKind::Payment,
                    "Order paid",
                    format!("Order {} was paid ({})", order.order_number, order.total),
                )
                .about("order", order.id),
            )
            .await;
    }
    state.broadcast_update(event_types::ORDER_UPDATE, Some(order.user_id), &order);
    state.dashboard_changed().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{access_token, json_body, send, test_config, test_router, test_state_with};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use rxdesk_common::models::user::Role;
    use secrecy::SecretString;

    const WEBHOOK_SECRET: &str = "whsec_test";

    fn router_with_webhook_secret() -> axum::Router {
        let mut config = test_config();
        config.payments.webhook_secret = Some(SecretString::from(WEBHOOK_SECRET.to_string()));
        crate::build_router(test_state_with(config))
    }

    #[tokio::test]
    async fn test_intent_is_unavailable_without_stripe() {
        let request = Request::post("/api/payments/intent")
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token(Role::Customer)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"order_id":"{}"}}"#, Uuid::now_v7())))
            .unwrap();
        let response = send(test_router(), request).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_config_reports_disabled() {
        let response = send(
            test_router(),
            Request::get("/api/payments/config").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["enabled"], false);
        assert_eq!(body["currency"], "usd");
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let request = Request::post("/api/payments/webhook")
            .header("stripe-signature", "t=1,v1=00")
            .body(Body::from(r#"{"id":"evt_1","type":"payment_intent.succeeded"}"#))
            .unwrap();
        let response = send(router_with_webhook_secret(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_unknown_events() {
        let payload = br#"{"id":"evt_2","type":"invoice.created","data":{"object":{}}}"#;
        let signed = signature::sign_stripe(payload, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
        let request = Request::post("/api/payments/webhook")
            .header("stripe-signature", signed)
            .body(Body::from(&payload[..]))
            .unwrap();
        let response = send(router_with_webhook_secret(), request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
    }

    #[tokio::test]
    async fn test_webhook_without_secret_is_unavailable() {
        let request = Request::post("/api/payments/webhook")
            .header("stripe-signature", "t=1,v1=00")
            .body(Body::from("{}"))
            .unwrap();
        let response = send(test_router(), request).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
