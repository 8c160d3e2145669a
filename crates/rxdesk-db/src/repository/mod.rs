//! Repository layer: query functions organized by domain.

pub mod appointments;
pub mod carts;
pub mod categories;
pub mod contact;
pub mod dashboard;
pub mod notifications;
pub mod orders;
pub mod prescriptions;
pub mod products;
pub mod refills;
pub mod settings;
pub mod subscriptions;
pub mod transfers;
pub mod users;
pub mod wordpress;
