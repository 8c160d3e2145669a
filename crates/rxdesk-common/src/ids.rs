//! Identifier generation.
//!
//! Every record uses a UUID v7: globally unique and time-sortable, so
//! `ORDER BY id` matches insertion order without a sequence. Human-facing order
//! numbers are generated here too.

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a new time-sortable record ID (UUID v7).
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}

/// Generate a customer-facing order number: `RX-YYYYMMDD-XXXXXX`.
///
/// The suffix avoids look-alike characters (0/O, 1/I) since customers read it
/// out over the phone.
pub fn order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.random_range(0..ORDER_NUMBER_ALPHABET.len());
            char::from(ORDER_NUMBER_ALPHABET[idx])
        })
        .collect();
    format!("RX-{}-{suffix}", now.format("%Y%m%d"))
}
