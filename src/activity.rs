//! activity.rs: in-memory log of delivery outcomes, read by the dashboard.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Tick,
    Test,
}

/// Short reference to the article a record is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: RecordKind,
    /// `None` when the record stands for a failed fetch.
    pub item: Option<ItemRef>,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub message_sid: Option<String>,
}

/// Record contents before the log assigns an id and timestamp.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub kind: RecordKind,
    pub item: Option<ItemRef>,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub message_sid: Option<String>,
}

impl NewRecord {
    pub fn sent(kind: RecordKind, item: ItemRef, message_sid: Option<String>) -> Self {
        Self {
            kind,
            item: Some(item),
            status: DeliveryStatus::Sent,
            error: None,
            message_sid,
        }
    }

    pub fn failed(kind: RecordKind, item: Option<ItemRef>, error: impl ToString) -> Self {
        Self {
            kind,
            item,
            status: DeliveryStatus::Failed,
            error: Some(error.to_string()),
            message_sid: None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    records: Vec<DeliveryRecord>,
}

/// Append-only (until cleared) ordered sequence of [`DeliveryRecord`]s.
#[derive(Debug, Default)]
pub struct ActivityLog {
    inner: Mutex<Inner>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, rec: NewRecord) -> DeliveryRecord {
        let mut g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        g.next_id += 1;
        let entry = DeliveryRecord {
            id: g.next_id,
            timestamp: Utc::now(),
            kind: rec.kind,
            item: rec.item,
            status: rec.status,
            error: rec.error,
            message_sid: rec.message_sid,
        };
        g.records.push(entry.clone());
        entry
    }

    /// Last `n` records, oldest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<DeliveryRecord> {
        let g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let start = g.records.len().saturating_sub(n);
        g.records[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all records. Ids keep increasing afterwards.
    pub fn clear(&self) -> usize {
        let mut g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let n = g.records.len();
        g.records.clear();
        n
    }
}
