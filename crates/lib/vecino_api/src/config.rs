//! API server configuration.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};
use vecino_core::auth::jwt::{
    DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS, DEFAULT_RESET_TTL_SECS, TokenConfig,
    resolve_secret,
};
use vecino_core::verification::{
    FixedCodeProvider, TwilioConfig, TwilioVerifyProvider, VerificationError,
    VerificationProvider,
};

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Secrets and lifetimes of the access, refresh and reset tokens.
    pub tokens: TokenConfig,
    /// Twilio Verify credentials.
    pub twilio: Option<TwilioConfig>,
    /// Code accepted by the fixed-code dev provider. Only consulted when
    /// `twilio` is `None`.
    pub dev_verification_code: Option<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                    | Default                              |
    /// |-----------------------------|--------------------------------------|
    /// | `BIND_ADDR`                 | `127.0.0.1:3100`                     |
    /// | `DATABASE_URL`              | `postgres://localhost:5432/vecino`   |
    /// | `JWT_ACCESS_SECRET`         | generated & persisted to file        |
    /// | `JWT_ACCESS_TTL_SECS`       | `900`                                |
    /// | `JWT_REFRESH_SECRET`        | generated & persisted to file        |
    /// | `JWT_REFRESH_TTL_SECS`      | `604800`                             |
    /// | `JWT_RESET_SECRET`          | generated & persisted to file        |
    /// | `JWT_RESET_TTL_SECS`        | `600`                                |
    /// | `TWILIO_ACCOUNT_SID` etc.   | unset                                |
    /// | `DEV_VERIFICATION_CODE`     | unset                                |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/vecino".into()),
            tokens: tokens_from_env(),
            twilio: twilio_from_env(),
            dev_verification_code: std::env::var("DEV_VERIFICATION_CODE")
                .ok()
                .filter(|code| !code.is_empty()),
        }
    }

    /// Twilio Verify when its credentials are set, otherwise the fixed-code
    /// provider when `DEV_VERIFICATION_CODE` is set. With neither, there is
    /// no way to deliver codes and the server must not start.
    pub fn verification_provider(
        &self,
    ) -> Result<Arc<dyn VerificationProvider>, VerificationError> {
        if let Some(twilio) = &self.twilio {
            info!("phone verification via Twilio Verify");
            return Ok(Arc::new(TwilioVerifyProvider::new(twilio.clone())?));
        }
        match &self.dev_verification_code {
            Some(code) => {
                warn!("DEV_VERIFICATION_CODE set, accepting a fixed code instead of sending SMS");
                Ok(Arc::new(FixedCodeProvider::new(code.clone())))
            }
            None => Err(VerificationError::Config(
                "set TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_VERIFY_SERVICE_SID, \
                 or DEV_VERIFICATION_CODE for local development"
                    .to_string(),
            )),
        }
    }
}

/// Token secrets and lifetimes from the environment.
pub fn tokens_from_env() -> TokenConfig {
    TokenConfig {
        access_secret: resolve_secret("JWT_ACCESS_SECRET", "jwt-access-secret"),
        access_ttl: ttl_from_env("JWT_ACCESS_TTL_SECS", DEFAULT_ACCESS_TTL_SECS),
        refresh_secret: resolve_secret("JWT_REFRESH_SECRET", "jwt-refresh-secret"),
        refresh_ttl: ttl_from_env("JWT_REFRESH_TTL_SECS", DEFAULT_REFRESH_TTL_SECS),
        reset_secret: resolve_secret("JWT_RESET_SECRET", "jwt-reset-secret"),
        reset_ttl: ttl_from_env("JWT_RESET_TTL_SECS", DEFAULT_RESET_TTL_SECS),
    }
}

fn ttl_from_env(key: &str, default_secs: i64) -> Duration {
    let secs = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default_secs);
    Duration::seconds(secs)
}

/// `None` only when no `TWILIO_*` variable is set. A partial set yields
/// empty fields, which the provider rejects at startup.
fn twilio_from_env() -> Option<TwilioConfig> {
    let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
    let account_sid = var("TWILIO_ACCOUNT_SID");
    let auth_token = var("TWILIO_AUTH_TOKEN");
    let service_sid = var("TWILIO_VERIFY_SERVICE_SID");
    if account_sid.is_none() && auth_token.is_none() && service_sid.is_none() {
        return None;
    }
    Some(TwilioConfig {
        account_sid: account_sid.unwrap_or_default(),
        auth_token: auth_token.unwrap_or_default(),
        service_sid: service_sid.unwrap_or_default(),
    })
}
