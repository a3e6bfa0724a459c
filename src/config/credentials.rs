// src/config/credentials.rs
use std::fmt;

use crate::error::StartupError;

/// Secrets for the two external services, read once at process start.
#[derive(Clone)]
pub struct Credentials {
    pub newsdata_api_key: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    /// Sender number, e.g. `whatsapp:+14155238886`.
    pub twilio_whatsapp_number: String,
}

impl Credentials {
    /// All four variables are required; the first missing one is reported.
    pub fn from_env() -> Result<Self, StartupError> {
        Ok(Self {
            newsdata_api_key: required("NEWSDATA_API_KEY")?,
            twilio_account_sid: required("TWILIO_ACCOUNT_SID")?,
            twilio_auth_token: required("TWILIO_AUTH_TOKEN")?,
            twilio_whatsapp_number: required("TWILIO_WHATSAPP_NUMBER")?,
        })
    }
}

fn required(key: &'static str) -> Result<String, StartupError> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(StartupError::MissingEnv(key))
}

// Only lengths are printed so secrets never reach the logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("newsdata_api_key_len", &self.newsdata_api_key.len())
            .field("twilio_account_sid_len", &self.twilio_account_sid.len())
            .field("twilio_auth_token_len", &self.twilio_auth_token.len())
            .field("twilio_whatsapp_number", &self.twilio_whatsapp_number)
            .finish()
    }
}
