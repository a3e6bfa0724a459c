use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{whatsapp_address, DispatchReceipt, MessageDispatcher};
use crate::error::DispatchError;

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

/// Sends WhatsApp messages through Twilio's Messages API.
#[derive(Clone)]
pub struct TwilioDispatcher {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
    timeout: Duration,
}

impl TwilioDispatcher {
    pub fn new(
        base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: &str,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from: whatsapp_address(from_number),
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }

    fn transport(&self, e: reqwest::Error) -> DispatchError {
        if e.is_timeout() {
            DispatchError::Timeout(self.timeout.as_secs())
        } else {
            DispatchError::Transport(e.without_url())
        }
    }
}

#[async_trait::async_trait]
impl MessageDispatcher for TwilioDispatcher {
    async fn send(&self, recipient: &str, payload: &str) -> Result<DispatchReceipt, DispatchError> {
        let to = whatsapp_address(recipient);
        let form = [
            ("From", self.from.as_str()),
            ("To", to.as_str()),
            ("Body", payload),
        ];
        let resp = self
            .client
            .post(self.messages_url())
            .timeout(self.timeout)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = resp.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(DispatchError::Unauthorized)
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(DispatchError::RateLimited),
            _ => {}
        }
        let body = resp.text().await.map_err(|e| self.transport(e))?;

        if !status.is_success() {
            return match serde_json::from_str::<TwilioErrorBody>(&body) {
                Ok(TwilioErrorBody {
                    code: Some(code),
                    message,
                }) if status.is_client_error() => Err(DispatchError::Rejected {
                    code,
                    message: message.unwrap_or_default(),
                }),
                _ => Err(DispatchError::Http(status)),
            };
        }

        // A 2xx with an unreadable body still means Twilio accepted the message.
        let resource = serde_json::from_str::<MessageResource>(&body).ok();
        let message_sid = resource.as_ref().and_then(|r| r.sid.clone());
        let twilio_status = resource
            .and_then(|r| r.status)
            .unwrap_or_else(|| "-".to_string());
        tracing::info!(
            sid = message_sid.as_deref().unwrap_or("-"),
            %twilio_status,
            "message accepted"
        );
        Ok(DispatchReceipt { message_sid })
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}
