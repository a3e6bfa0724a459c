// tests/common/mod.rs
//
// In-process fakes for the two external services.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use whatsapp_news_bot::activity::ActivityLog;
use whatsapp_news_bot::delivery::DeliveryLoop;
use whatsapp_news_bot::error::{DispatchError, FetchError};
use whatsapp_news_bot::news::{NewsFetcher, NewsItem};
use whatsapp_news_bot::notify::{DispatchReceipt, MessageDispatcher};
use whatsapp_news_bot::store::{ConfigStore, Configuration};

pub const RECIPIENT: &str = "+15550001111";

pub fn item(n: usize) -> NewsItem {
    NewsItem {
        title: format!("Headline {n}"),
        summary: format!("Summary for story {n}."),
        url: format!("https://news.example.com/story/{n}"),
        source: "example".into(),
        published_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
    }
}

pub fn tech_config() -> Configuration {
    let mut cfg = Configuration::with_recipient(RECIPIENT);
    cfg.topics = ["tech".to_string()].into();
    cfg.interval_minutes = 60;
    cfg
}

/// Returns a fixed list, or a fixed error.
pub struct FakeFetcher {
    pub items: Vec<NewsItem>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn with_items(n: usize) -> Self {
        Self {
            items: (1..=n).map(item).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            items: vec![],
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NewsFetcher for FakeFetcher {
    async fn fetch(&self, _config: &Configuration) -> Result<Vec<NewsItem>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FetchError::Unauthorized);
        }
        Ok(self.items.clone())
    }
    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Blocks inside `fetch` until `gate` is notified.
pub struct GatedFetcher {
    pub entered: Arc<Notify>,
    pub gate: Arc<Notify>,
}

#[async_trait]
impl NewsFetcher for GatedFetcher {
    async fn fetch(&self, _config: &Configuration) -> Result<Vec<NewsItem>, FetchError> {
        self.entered.notify_one();
        self.gate.notified().await;
        Ok(vec![])
    }
    fn name(&self) -> &'static str {
        "gated"
    }
}

/// Fails on the given 1-based call numbers, succeeds otherwise.
#[derive(Default)]
pub struct ScriptedDispatcher {
    pub fail_on: HashSet<usize>,
    pub hang: bool,
    pub calls: AtomicUsize,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl ScriptedDispatcher {
    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn payloads(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl MessageDispatcher for ScriptedDispatcher {
    async fn send(&self, recipient: &str, payload: &str) -> Result<DispatchReceipt, DispatchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), payload.to_string()));
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail_on.contains(&n) {
            return Err(DispatchError::Rejected {
                code: 21211,
                message: "invalid 'To' number".into(),
            });
        }
        Ok(DispatchReceipt {
            message_sid: Some(format!("SM{n}")),
        })
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn delivery_loop(
    config: Configuration,
    fetcher: Arc<dyn NewsFetcher>,
    dispatcher: Arc<dyn MessageDispatcher>,
) -> Arc<DeliveryLoop> {
    let store = Arc::new(ConfigStore::new(config).expect("valid test config"));
    Arc::new(DeliveryLoop::new(
        store,
        fetcher,
        dispatcher,
        Arc::new(ActivityLog::new()),
    ))
}
