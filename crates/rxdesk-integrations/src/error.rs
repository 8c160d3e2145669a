//! Integration error types.

use rxdesk_common::error::RxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrationError {
    // ── Configuration ───────────────────────────────────────────────────────

    #[error("{0} integration is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid {service} base URL: {message}")]
    BadUrl { service: &'static str, message: String },

    // ── Remote communication ────────────────────────────────────────────────

    #[error("HTTP error talking to {service}: {message}")]
    Http { service: &'static str, message: String },

    #[error("{service} returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Unexpected response from {service}: {message}")]
    Decode { service: &'static str, message: String },

    // ── Webhooks ────────────────────────────────────────────────────────────

    #[error("Webhook signature verification failed: {0}")]
    InvalidSignature(String),
}

impl IntegrationError {
    pub(crate) fn http(service: &'static str, e: reqwest::Error) -> Self {
        IntegrationError::Http {
            service,
            message: e.to_string(),
        }
    }

    pub(crate) fn decode(service: &'static str, e: impl std::fmt::Display) -> Self {
        IntegrationError::Decode {
            service,
            message: e.to_string(),
        }
    }

    /// Remote answered 404 (e.g. a WordPress post that does not exist).
    pub fn is_not_found(&self) -> bool {
        matches!(self, IntegrationError::Api { status: 404, .. })
    }
}

impl From<IntegrationError> for RxError {
    fn from(e: IntegrationError) -> Self {
        match e {
            IntegrationError::NotConfigured(service) => RxError::ServiceUnavailable {
                service: service.to_string(),
            },
            IntegrationError::InvalidSignature(_) => RxError::Validation {
                message: "Invalid webhook signature".into(),
            },
            IntegrationError::BadUrl { service, message }
            | IntegrationError::Http { service, message }
            | IntegrationError::Decode { service, message } => RxError::Upstream {
                service: service.to_string(),
                message,
            },
            IntegrationError::Api {
                service,
                status,
                message,
            } => RxError::Upstream {
                service: service.to_string(),
                message: format!("{status}: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_http_status() {
        let disabled: RxError = IntegrationError::NotConfigured("stripe").into();
        assert_eq!(disabled.status_code().as_u16(), 503);

        let upstream: RxError = IntegrationError::Api {
            service: "wordpress",
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert_eq!(upstream.status_code().as_u16(), 502);

        let sig: RxError = IntegrationError::InvalidSignature("mismatch".into()).into();
        assert_eq!(sig.status_code().as_u16(), 400);
    }
}
