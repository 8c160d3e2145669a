//! # rxdesk-integrations
//!
//! Outbound HTTP clients for the third-party services rxdesk talks to:
//!
//! - **WordPress** (`wp-json/wp/v2`): blog posts for the storefront
//! - **WooCommerce** (`wp-json/wc/v3`): product catalogue push
//! - **Stripe** (`api.stripe.com/v1`): payment intents, customers, subscriptions
//!
//! Inbound webhook signatures for Stripe and WooCommerce are verified in
//! [`signature`].

pub mod error;
pub mod signature;
pub mod stripe;
pub mod wordpress;

use std::time::Duration;

pub use error::IntegrationError;

/// Shared `reqwest` client: 30 s timeout and a product user agent.
pub fn http_client() -> Result<reqwest::Client, IntegrationError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("rxdesk/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| IntegrationError::Http {
            service: "http",
            message: e.to_string(),
        })
}
