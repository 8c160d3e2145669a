//! Stripe REST client.
//!
//! Stripe takes form-encoded bodies and a bearer secret key. Only the
//! handful of endpoints the storefront needs are wrapped here.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::IntegrationError;

const SERVICE: &str = "stripe";
const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    secret_key: SecretString,
    base_url: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

impl StripeSubscription {
    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }
}

/// Webhook event envelope. `data.object` is decoded per event type.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    pub fn object<T: DeserializeOwned>(&self) -> Result<T, IntegrationError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| IntegrationError::decode(SERVICE, e))
    }
}

/// The `payment_intent` field of a charge object (`charge.refunded`).
#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    pub payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(http: Client, secret_key: SecretString) -> Self {
        Self::with_base_url(http, secret_key, STRIPE_API_BASE)
    }

    /// Point the client somewhere other than api.stripe.com (stripe-mock, tests).
    pub fn with_base_url(http: Client, secret_key: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            http,
            secret_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, IntegrationError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(self.secret_key.expose_secret());
        if !form.is_empty() {
            request = request.form(form);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IntegrationError::http(SERVICE, e))?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            warn!(path, status = status.as_u16(), "Stripe API error: {message}");
            return Err(IntegrationError::Api {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| IntegrationError::decode(SERVICE, e))
    }

    /// `POST /customers`
    #[instrument(skip(self, email, name))]
    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
        user_id: &str,
    ) -> Result<Customer, IntegrationError> {
        let customer: Customer = self
            .send(
                Method::POST,
                "/customers",
                &[
                    ("email", email.to_string()),
                    ("name", name.to_string()),
                    ("metadata[user_id]", user_id.to_string()),
                ],
            )
            .await?;
        debug!(customer_id = %customer.id, "Stripe customer created");
        Ok(customer)
    }

    /// `POST /payment_intents` for an order total in minor units.
    #[instrument(skip(self))]
    pub async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        customer_id: &str,
        order_id: &str,
        order_number: &str,
    ) -> Result<PaymentIntent, IntegrationError> {
        self.send(
            Method::POST,
            "/payment_intents",
            &[
                ("amount", amount.to_string()),
                ("currency", currency.to_lowercase()),
                ("customer", customer_id.to_string()),
                ("automatic_payment_methods[enabled]", "true".to_string()),
                ("metadata[order_id]", order_id.to_string()),
                ("metadata[order_number]", order_number.to_string()),
            ],
        )
        .await
    }

    /// `POST /subscriptions`
    #[instrument(skip(self))]
    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription, IntegrationError> {
        self.send(
            Method::POST,
            "/subscriptions",
            &[
                ("customer", customer_id.to_string()),
                ("items[0][price]", price_id.to_string()),
                ("payment_behavior", "default_incomplete".to_string()),
            ],
        )
        .await
    }

    /// Flag a subscription to end with its current billing period.
    #[instrument(skip(self))]
    pub async fn cancel_subscription_at_period_end(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, IntegrationError> {
        self.send(
            Method::POST,
            &format!("/subscriptions/{subscription_id}"),
            &[("cancel_at_period_end", "true".to_string())],
        )
        .await
    }
}

/// Parse a raw webhook body into an [`Event`]. Call only after the
/// signature has been verified.
pub fn parse_event(payload: &[u8]) -> Result<Event, IntegrationError> {
    serde_json::from_slice(payload).map_err(|e| IntegrationError::decode(SERVICE, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Form, Json, Router, routing::post};
    use std::collections::HashMap;

    async fn mock_stripe() -> String {
        let app = Router::new()
            .route(
                "/payment_intents",
                post(|Form(form): Form<HashMap<String, String>>| async move {
                    Json(serde_json::json!({
                        "id": "pi_123",
                        "client_secret": "pi_123_secret_abc",
                        "amount": form["amount"].parse::<i64>().unwrap(),
                        "currency": form["currency"],
                        "status": "requires_payment_method",
                        "metadata": { "order_id": form["metadata[order_id]"] },
                    }))
                }),
            )
            .route(
                "/customers",
                post(|| async {
                    (
                        axum::http::StatusCode::PAYMENT_REQUIRED,
                        Json(serde_json::json!({ "error": { "message": "Your card was declined." } })),
                    )
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str) -> StripeClient {
        StripeClient::with_base_url(
            crate::http_client().unwrap(),
            SecretString::from("sk_test_123".to_string()),
            base,
        )
    }

    #[tokio::test]
    async fn test_create_payment_intent_sends_form() {
        let base = mock_stripe().await;
        let intent = client(&base)
            .create_payment_intent(2599, "USD", "cus_1", "order-1", "RX-20260101-ABC123")
            .await
            .unwrap();
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.amount, 2599);
        assert_eq!(intent.currency, "usd");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
    }

    #[tokio::test]
    async fn test_api_error_message_is_surfaced() {
        let base = mock_stripe().await;
        let err = client(&base)
            .create_customer("a@example.com", "A B", "u1")
            .await
            .unwrap_err();
        match err {
            IntegrationError::Api { status, message, .. } => {
                assert_eq!(status, 402);
                assert_eq!(message, "Your card was declined.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_event_and_object() {
        let body = br#"{
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_1", "status": "past_due",
                "current_period_end": 1760000000, "cancel_at_period_end": true
            } }
        }"#;
        let event = parse_event(body).unwrap();
        assert_eq!(event.event_type, "customer.subscription.updated");
        let sub: StripeSubscription = event.object().unwrap();
        assert_eq!(sub.status, "past_due");
        assert!(sub.cancel_at_period_end);
        assert_eq!(sub.period_end().unwrap().timestamp(), 1_760_000_000);
    }
}
