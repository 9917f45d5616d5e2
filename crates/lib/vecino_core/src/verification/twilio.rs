//! Twilio Verify provider.
//!
//! Uses the Verify v2 REST API: `Verifications` to send a code over SMS and
//! `VerificationCheck` to check it.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{VerificationError, VerificationProvider};

const TWILIO_VERIFY_URL: &str = "https://verify.twilio.com/v2";

/// Twilio account credentials and the Verify service to use.
#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub service_sid: String,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("service_sid", &self.service_sid)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct VerificationCheckResponse {
    status: String,
}

pub struct TwilioVerifyProvider {
    client: Client,
    config: TwilioConfig,
    base_url: String,
}

impl TwilioVerifyProvider {
    pub fn new(config: TwilioConfig) -> Result<Self, VerificationError> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() || config.service_sid.is_empty()
        {
            return Err(VerificationError::Config(
                "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_VERIFY_SERVICE_SID are required"
                    .to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            config,
            base_url: TWILIO_VERIFY_URL.to_string(),
        })
    }

    /// Point the client at another Verify endpoint, such as a local stub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn service_url(&self, resource: &str) -> String {
        format!(
            "{}/Services/{}/{resource}",
            self.base_url, self.config.service_sid
        )
    }
}

#[async_trait]
impl VerificationProvider for TwilioVerifyProvider {
    async fn send_code(&self, phone: &str) -> Result<(), VerificationError> {
        let resp = self
            .client
            .post(self.service_url("Verifications"))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", phone), ("Channel", "sms")])
            .send()
            .await
            .map_err(|e| VerificationError::Provider(format!("Twilio request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(VerificationError::Provider(format!(
                "Twilio send failed: {status} {body}"
            )));
        }
        Ok(())
    }

    async fn check_code(&self, phone: &str, code: &str) -> Result<bool, VerificationError> {
        let resp = self
            .client
            .post(self.service_url("VerificationCheck"))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", phone), ("Code", code)])
            .send()
            .await
            .map_err(|e| VerificationError::Provider(format!("Twilio request failed: {e}")))?;

        // No pending verification (expired, already approved or never sent).
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(VerificationError::Provider(format!(
                "Twilio check failed: {status}"
            )));
        }
        let check: VerificationCheckResponse = resp.json().await.map_err(|e| {
            VerificationError::Provider(format!("Twilio response parse error: {e}"))
        })?;
        Ok(check.status == "approved")
    }
}
