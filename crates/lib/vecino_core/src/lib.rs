//! # vecino_core
//!
//! Authentication and authorization core for Vecino: token minting, refresh
//! rotation, role gating, password recovery and the realtime channel's
//! connection authentication.

pub mod auth;
pub mod models;
pub mod realtime;
pub mod store;
pub mod verification;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
