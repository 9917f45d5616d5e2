//! SMS verification providers.
//!
//! The recovery flow only needs two calls: send a one-time code to a phone
//! and check a code against a phone. Delivery and code storage belong to the
//! provider.

mod fixed;
mod twilio;

pub use fixed::FixedCodeProvider;
pub use twilio::{TwilioConfig, TwilioVerifyProvider};

use async_trait::async_trait;
use thiserror::Error;

/// Verification provider errors.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Provider configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Contract for one-time-code delivery and checking.
#[async_trait]
pub trait VerificationProvider: Send + Sync {
    /// Send a one-time code to `phone`.
    async fn send_code(&self, phone: &str) -> Result<(), VerificationError>;

    /// Returns `Ok(true)` when `code` is the current code for `phone`.
    async fn check_code(&self, phone: &str, code: &str) -> Result<bool, VerificationError>;
}
