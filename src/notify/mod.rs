pub mod twilio;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

pub use twilio::TwilioDispatcher;

/// Acknowledgement from the messaging API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub message_sid: Option<String>,
}

#[async_trait::async_trait]
pub trait MessageDispatcher: Send + Sync {
    /// One API call per payload; no retries.
    async fn send(&self, recipient: &str, payload: &str) -> Result<DispatchReceipt, DispatchError>;
    fn name(&self) -> &'static str;
}

/// `+1555…` becomes `whatsapp:+1555…`; already-prefixed values pass through.
pub fn whatsapp_address(number: &str) -> String {
    let n = number.trim();
    if n.starts_with("whatsapp:") {
        n.to_string()
    } else {
        format!("whatsapp:{n}")
    }
}
