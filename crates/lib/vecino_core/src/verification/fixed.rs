//! Fixed-code provider for local development and tests.
//!
//! Nothing is delivered: a send is logged and recorded, and the configured
//! code is accepted once per send for the phone it was sent to.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::info;

use super::{VerificationError, VerificationProvider};

pub struct FixedCodeProvider {
    code: String,
    /// phone -> number of codes sent
    sent: DashMap<String, u32>,
    /// phones holding an unused code
    pending: DashSet<String>,
}

impl FixedCodeProvider {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            sent: DashMap::new(),
            pending: DashSet::new(),
        }
    }

    /// How many codes were sent to `phone`.
    pub fn sent_count(&self, phone: &str) -> u32 {
        self.sent.get(phone).map(|n| *n).unwrap_or(0)
    }

    /// Total number of sends across all phones.
    pub fn total_sent(&self) -> u32 {
        self.sent.iter().map(|entry| *entry.value()).sum()
    }
}

#[async_trait]
impl VerificationProvider for FixedCodeProvider {
    async fn send_code(&self, phone: &str) -> Result<(), VerificationError> {
        *self.sent.entry(phone.to_string()).or_insert(0) += 1;
        self.pending.insert(phone.to_string());
        info!(phone, "verification code requested (fixed-code provider, not delivered)");
        Ok(())
    }

    /// A matching code is consumed; a wrong one leaves the pending code
    /// in place.
    async fn check_code(&self, phone: &str, code: &str) -> Result<bool, VerificationError> {
        if code != self.code {
            return Ok(false);
        }
        Ok(self.pending.remove(phone).is_some())
    }
}
