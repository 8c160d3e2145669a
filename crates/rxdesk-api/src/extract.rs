//! Request extractors that reject with [`RxError`] instead of axum's plain-text bodies.

use axum::extract::FromRequest;
use rxdesk_common::error::RxError;

/// JSON request body. Malformed JSON, missing fields and unknown enum
/// variants become a 400 `VALIDATION_ERROR`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(RxError))]
pub struct JsonBody<T>(pub T);
