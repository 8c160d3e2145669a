//! # rxdesk-common
//!
//! Shared types, configuration, error handling, and business rules used across all
//! rxdesk crates. No I/O lives here: just primitives, models and contracts.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway_event;
pub mod ids;
pub mod models;
pub mod pagination;
pub mod pricing;
pub mod validation;
