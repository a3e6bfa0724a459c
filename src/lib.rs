// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod activity;
pub mod api;
pub mod config;
pub mod delivery;
pub mod error;
pub mod format;
pub mod metrics;
pub mod news;
pub mod notify;
pub mod store;

pub use crate::api::create_router as router;
pub use crate::delivery::{DeliveryLoop, TickReport};
pub use crate::error::{DispatchError, FetchError, StartupError, ValidationError};

use std::sync::Arc;

use crate::activity::ActivityLog;
use crate::config::{BotSettings, Credentials, RuntimeSettings};
use crate::news::NewsDataFetcher;
use crate::notify::TwilioDispatcher;
use crate::store::ConfigStore;

/// Wire the real NewsData.io and Twilio clients around a fresh store and log.
pub fn build_delivery_loop(
    settings: &BotSettings,
    creds: &Credentials,
    runtime: &RuntimeSettings,
) -> anyhow::Result<Arc<DeliveryLoop>> {
    let store = Arc::new(ConfigStore::new(settings.config.clone()).map_err(StartupError::from)?);
    let fetcher = NewsDataFetcher::new(
        runtime.newsdata_base_url.as_str(),
        creds.newsdata_api_key.as_str(),
        runtime.http_timeout_secs,
    )?;
    let dispatcher = TwilioDispatcher::new(
        runtime.twilio_base_url.as_str(),
        creds.twilio_account_sid.as_str(),
        creds.twilio_auth_token.as_str(),
        &creds.twilio_whatsapp_number,
    )
    .with_timeout(runtime.http_timeout_secs);

    // Outer bound slightly above the HTTP client timeout.
    let call_timeout = std::time::Duration::from_secs(runtime.http_timeout_secs + 5);
    let delivery = DeliveryLoop::new(
        store,
        Arc::new(fetcher),
        Arc::new(dispatcher),
        Arc::new(ActivityLog::new()),
    )
    .with_call_timeout(call_timeout);
    Ok(Arc::new(delivery))
}
