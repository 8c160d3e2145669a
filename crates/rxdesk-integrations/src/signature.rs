//! Webhook signature verification.
//!
//! - Stripe: `Stripe-Signature: t=<unix>,v1=<hex>` where the MAC is
//!   HMAC-SHA256 over `"{t}.{raw body}"`, with a replay window.
//! - WooCommerce: `X-WC-Webhook-Signature: <base64>` where the MAC is
//!   HMAC-SHA256 over the raw body.
//!
//! Comparison goes through `Mac::verify_slice`, which is constant-time.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::error::IntegrationError;

type HmacSha256 = Hmac<Sha256>;

/// Stripe's default tolerance for the signed timestamp.
pub const STRIPE_TOLERANCE_SECS: i64 = 300;

fn mac(secret: &str) -> Result<HmacSha256, IntegrationError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| IntegrationError::InvalidSignature(e.to_string()))
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// `now` is the current unix time; any `v1` entry may match (Stripe sends
/// several during secret rotation).
pub fn verify_stripe(
    header: &str,
    payload: &[u8],
    secret: &str,
    now: i64,
) -> Result<(), IntegrationError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| IntegrationError::InvalidSignature("missing timestamp".into()))?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| IntegrationError::InvalidSignature("invalid timestamp".into()))?;

    let within_tolerance = now
        .checked_sub(ts)
        .map(i64::unsigned_abs)
        .is_some_and(|age| age <= STRIPE_TOLERANCE_SECS.unsigned_abs());
    if !within_tolerance {
        return Err(IntegrationError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }
    if signatures.is_empty() {
        return Err(IntegrationError::InvalidSignature("missing v1 signature".into()));
    }

    for candidate in signatures {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let mut m = mac(secret)?;
        m.update(timestamp.as_bytes());
        m.update(b".");
        m.update(payload);
        if m.verify_slice(&expected).is_ok() {
            debug!("Stripe signature verified");
            return Ok(());
        }
    }

    Err(IntegrationError::InvalidSignature("signature mismatch".into()))
}

/// Verify an `X-WC-Webhook-Signature` header against the raw request body.
pub fn verify_woocommerce(header: &str, payload: &[u8], secret: &str) -> Result<(), IntegrationError> {
    let expected = BASE64
        .decode(header.trim())
        .map_err(|_| IntegrationError::InvalidSignature("signature is not base64".into()))?;

    let mut m = mac(secret)?;
    m.update(payload);
    m.verify_slice(&expected)
        .map_err(|_| IntegrationError::InvalidSignature("signature mismatch".into()))?;

    debug!("WooCommerce signature verified");
    Ok(())
}

/// Produce a `Stripe-Signature` header value (used by tests and local tooling).
pub fn sign_stripe(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, IntegrationError> {
    let mut m = mac(secret)?;
    m.update(timestamp.to_string().as_bytes());
    m.update(b".");
    m.update(payload);
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(m.finalize().into_bytes())
    ))
}

/// Produce an `X-WC-Webhook-Signature` header value.
pub fn sign_woocommerce(payload: &[u8], secret: &str) -> Result<String, IntegrationError> {
    let mut m = mac(secret)?;
    m.update(payload);
    Ok(BASE64.encode(m.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn test_stripe_signature_roundtrip() {
        let now = 1_760_000_000;
        let header = sign_stripe(BODY, SECRET, now).unwrap();
        assert!(verify_stripe(&header, BODY, SECRET, now + 10).is_ok());
    }

    #[test]
    fn test_stripe_accepts_any_v1_entry() {
        let now = 1_760_000_000;
        let good = sign_stripe(BODY, SECRET, now).unwrap();
        let v1 = good.split_once(",v1=").unwrap().1;
        let header = format!("t={now},v1=deadbeef,v0=ignored,v1={v1}");
        assert!(verify_stripe(&header, BODY, SECRET, now).is_ok());
    }

    #[test]
    fn test_stripe_rejects_tampered_body_and_wrong_secret() {
        let now = 1_760_000_000;
        let header = sign_stripe(BODY, SECRET, now).unwrap();
        assert!(verify_stripe(&header, b"{}", SECRET, now).is_err());
        assert!(verify_stripe(&header, BODY, "other", now).is_err());
    }

    #[test]
    fn test_stripe_rejects_stale_timestamp() {
        let signed_at = 1_760_000_000;
        let header = sign_stripe(BODY, SECRET, signed_at).unwrap();
        let result = verify_stripe(&header, BODY, SECRET, signed_at + STRIPE_TOLERANCE_SECS + 1);
        assert!(matches!(result, Err(IntegrationError::InvalidSignature(_))));
    }

    #[test]
    fn test_stripe_rejects_malformed_headers() {
        assert!(verify_stripe("", BODY, SECRET, 0).is_err());
        assert!(verify_stripe("t=abc,v1=00", BODY, SECRET, 0).is_err());
        assert!(verify_stripe("t=0", BODY, SECRET, 0).is_err());
    }

    #[test]
    fn test_stripe_extreme_timestamps_are_rejected() {
        let now = 1_760_000_000;
        assert!(verify_stripe("t=-9223372036854775808,v1=00", BODY, SECRET, now).is_err());
        assert!(verify_stripe("t=9223372036854775807,v1=00", BODY, SECRET, now).is_err());
        assert!(verify_stripe("t=-9223372036854775808,v1=00", BODY, SECRET, i64::MAX).is_err());
    }

    #[test]
    fn test_woocommerce_signature() {
        let header = sign_woocommerce(BODY, SECRET).unwrap();
        assert!(verify_woocommerce(&header, BODY, SECRET).is_ok());
        assert!(verify_woocommerce(&header, b"tampered", SECRET).is_err());
        assert!(verify_woocommerce("%%%not-base64", BODY, SECRET).is_err());
    }
}
