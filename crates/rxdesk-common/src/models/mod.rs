//! Domain models shared by the API, the gateway and the repositories.
//!
//! These are the stored shapes plus the request/response DTOs around them.

pub mod appointment;
pub mod cart;
pub mod catalog;
pub mod contact;
pub mod notification;
pub mod order;
pub mod prescription;
pub mod refill;
pub mod settings;
pub mod subscription;
pub mod transfer;
pub mod user;
pub mod wordpress;

pub use appointment::*;
pub use cart::*;
pub use catalog::*;
pub use contact::*;
pub use notification::*;
pub use order::*;
pub use prescription::*;
pub use refill::*;
pub use settings::*;
pub use subscription::*;
pub use transfer::*;
pub use user::*;
pub use wordpress::*;
