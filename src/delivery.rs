// src/delivery.rs
//! Fixed-interval fetch → format → dispatch loop.
//!
//! A tick reads a configuration snapshot, calls the fetcher once and sends
//! one message per returned item, appending one activity record per item.
//! A failed fetch appends a single failed record and sends nothing. Locks are
//! never held across the external calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::activity::{ActivityLog, DeliveryRecord, ItemRef, NewRecord, RecordKind};
use crate::error::{DispatchError, FetchError};
use crate::format::MessageFormatter;
use crate::news::{NewsFetcher, NewsItem};
use crate::notify::{DispatchReceipt, MessageDispatcher};
use crate::store::{ConfigStore, Configuration};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickReport {
    /// Another tick was still running.
    Skipped,
    FetchFailed { error: String },
    Completed {
        fetched: usize,
        sent: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct LoopStatus {
    pub running: bool,
    pub busy: bool,
    pub interval_minutes: u32,
    pub records: usize,
    pub last_tick: Option<DateTime<Utc>>,
}

/// Clears the busy flag when the tick ends, even on panic.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DeliveryLoop {
    store: Arc<ConfigStore>,
    fetcher: Arc<dyn NewsFetcher>,
    dispatcher: Arc<dyn MessageDispatcher>,
    activity: Arc<ActivityLog>,
    call_timeout: Duration,
    busy: AtomicBool,
    running: watch::Sender<bool>,
    reschedule: Notify,
    last_tick: Mutex<Option<DateTime<Utc>>>,
}

impl DeliveryLoop {
    pub fn new(
        store: Arc<ConfigStore>,
        fetcher: Arc<dyn NewsFetcher>,
        dispatcher: Arc<dyn MessageDispatcher>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            store,
            fetcher,
            dispatcher,
            activity,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            busy: AtomicBool::new(false),
            running,
            reschedule: Notify::new(),
            last_tick: Mutex::new(None),
        }
    }

    /// Upper bound for a single fetch or dispatch call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    // --- control ---

    /// Returns `true` if the loop was stopped before.
    pub fn start(&self) -> bool {
        let changed = self.set_running(true);
        if changed {
            tracing::info!("delivery loop started");
        }
        changed
    }

    /// Returns `true` if the loop was running before. An in-flight tick finishes.
    pub fn stop(&self) -> bool {
        let changed = self.set_running(false);
        if changed {
            tracing::info!("delivery loop stopping");
        }
        changed
    }

    fn set_running(&self, want: bool) -> bool {
        self.running.send_if_modified(|cur| {
            if *cur == want {
                false
            } else {
                *cur = want;
                true
            }
        })
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Wake the scheduler so a changed interval applies to the current wait.
    pub fn reschedule(&self) {
        self.reschedule.notify_waiters();
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            running: self.is_running(),
            busy: self.is_busy(),
            interval_minutes: self.store.get().interval_minutes,
            records: self.activity.len(),
            last_tick: *self.last_tick.lock().unwrap_or_else(|p| p.into_inner()),
        }
    }

    // --- ticks ---

    pub async fn run_tick(&self) -> TickReport {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            counter!("bot_ticks_skipped_total").increment(1);
            tracing::warn!("previous tick still running, skipping");
            return TickReport::Skipped;
        };
        let t0 = std::time::Instant::now();
        counter!("bot_ticks_total").increment(1);

        let config = self.store.get();
        let report = match self.fetch(&config).await {
            Err(e) => {
                counter!("bot_fetch_errors_total").increment(1);
                tracing::warn!(error = %e, fetcher = self.fetcher.name(), "fetch failed, skipping tick");
                self.activity.push(NewRecord::failed(
                    RecordKind::Tick,
                    None,
                    format!("fetch failed: {e}"),
                ));
                TickReport::FetchFailed {
                    error: e.to_string(),
                }
            }
            Ok(items) => self.deliver_all(&config, items).await,
        };

        let now = Utc::now();
        *self.last_tick.lock().unwrap_or_else(|p| p.into_inner()) = Some(now);
        histogram!("bot_tick_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!("bot_last_tick_ts").set(now.timestamp() as f64);
        report
    }

    async fn deliver_all(&self, config: &Configuration, items: Vec<NewsItem>) -> TickReport {
        let formatter = MessageFormatter::new(config.max_payload_chars);
        let fetched = items.len();
        let (mut sent, mut failed) = (0usize, 0usize);

        for item in items {
            let payload = formatter.format(&item);
            let item_ref = ItemRef {
                title: item.title,
                url: item.url,
            };
            let rec = match self.dispatch(&config.recipient, &payload).await {
                Ok(receipt) => {
                    sent += 1;
                    counter!("bot_messages_sent_total").increment(1);
                    NewRecord::sent(RecordKind::Tick, item_ref, receipt.message_sid)
                }
                Err(e) => {
                    failed += 1;
                    counter!("bot_messages_failed_total").increment(1);
                    tracing::warn!(error = %e, url = %item_ref.url, "dispatch failed");
                    NewRecord::failed(RecordKind::Tick, Some(item_ref), e)
                }
            };
            self.activity.push(rec);
        }

        tracing::info!(fetched, sent, failed, "tick complete");
        TickReport::Completed {
            fetched,
            sent,
            failed,
        }
    }

    /// Fetch, send the first item with a test banner, record it as `test`.
    pub async fn send_test_message(&self) -> DeliveryRecord {
        let config = self.store.get();
        let rec = match self.fetch(&config).await {
            Err(e) => NewRecord::failed(RecordKind::Test, None, format!("fetch failed: {e}")),
            Ok(items) => match items.into_iter().next() {
                None => NewRecord::failed(
                    RecordKind::Test,
                    None,
                    "no news articles found for the given criteria",
                ),
                Some(item) => {
                    let payload = MessageFormatter::new(config.max_payload_chars).format_test(&item);
                    let item_ref = ItemRef {
                        title: item.title,
                        url: item.url,
                    };
                    match self.dispatch(&config.recipient, &payload).await {
                        Ok(r) => NewRecord::sent(RecordKind::Test, item_ref, r.message_sid),
                        Err(e) => NewRecord::failed(RecordKind::Test, Some(item_ref), e),
                    }
                }
            },
        };
        let rec = self.activity.push(rec);
        tracing::info!(status = ?rec.status, "test message processed");
        rec
    }

    async fn fetch(&self, config: &Configuration) -> Result<Vec<NewsItem>, FetchError> {
        tokio::time::timeout(self.call_timeout, self.fetcher.fetch(config))
            .await
            .unwrap_or(Err(FetchError::Timeout(self.call_timeout.as_secs())))
    }

    async fn dispatch(&self, recipient: &str, payload: &str) -> Result<DispatchReceipt, DispatchError> {
        tokio::time::timeout(self.call_timeout, self.dispatcher.send(recipient, payload))
            .await
            .unwrap_or(Err(DispatchError::Timeout(self.call_timeout.as_secs())))
    }

    // --- scheduler ---

    /// Background task: while started, tick immediately, then every
    /// `interval_minutes` (re-read from the store on every wait).
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx = this.running.subscribe();
            loop {
                if !*rx.borrow_and_update() {
                    // The sender lives in `this`, so this never errors.
                    let _ = rx.changed().await;
                    continue;
                }
                let report = this.run_tick().await;
                tracing::debug!(?report, "scheduled tick finished");
                this.wait_for_next_tick(&mut rx).await;
            }
        })
    }

    /// Returns when the interval has elapsed or start/stop state changed.
    async fn wait_for_next_tick(&self, rx: &mut watch::Receiver<bool>) {
        let started = Instant::now();
        loop {
            let minutes = self.store.get().interval_minutes;
            let deadline = started + Duration::from_secs(u64::from(minutes) * 60);
            tracing::info!(minutes, "waiting for next tick");
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return,
                _ = self.reschedule.notified() => continue,
                _ = rx.changed() => return,
            }
        }
    }
}
