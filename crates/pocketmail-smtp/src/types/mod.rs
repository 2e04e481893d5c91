//! Core SMTP types.

mod address;
mod auth;
mod reply;

pub use address::Address;
pub use auth::AuthMechanism;
pub use reply::{Reply, ReplyCode};
