// src/store.rs
//! Current bot configuration, shared between the dashboard and the delivery loop.

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_TOPIC: &str = "world news";
pub const DEFAULT_COUNTRY: &str = "us";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_INTERVAL_MINUTES: u32 = 60;
pub const DEFAULT_MAX_ARTICLES: u32 = 3;
/// Twilio rejects WhatsApp bodies above 1600 characters.
pub const DEFAULT_MAX_PAYLOAD_CHARS: usize = 1600;
pub const MIN_PAYLOAD_CHARS: usize = 40;

/// User-controlled parameters. Credentials live in [`crate::config::Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub topics: BTreeSet<String>,
    pub languages: BTreeSet<String>,
    pub countries: BTreeSet<String>,
    pub filtering_enabled: bool,
    pub interval_minutes: u32,
    pub recipient: String,
    pub max_articles: u32,
    pub max_payload_chars: usize,
}

impl Configuration {
    /// Stock topics and filters, with the given recipient.
    pub fn with_recipient(recipient: impl Into<String>) -> Self {
        Self {
            topics: BTreeSet::from([DEFAULT_TOPIC.to_string()]),
            languages: BTreeSet::from([DEFAULT_LANGUAGE.to_string()]),
            countries: BTreeSet::from([DEFAULT_COUNTRY.to_string()]),
            filtering_enabled: true,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            recipient: recipient.into(),
            max_articles: DEFAULT_MAX_ARTICLES,
            max_payload_chars: DEFAULT_MAX_PAYLOAD_CHARS,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_minutes == 0 {
            return Err(ValidationError::new(
                "interval_minutes",
                "must be greater than zero",
            ));
        }
        if self.max_articles == 0 {
            return Err(ValidationError::new(
                "max_articles",
                "must be greater than zero",
            ));
        }
        if self.max_payload_chars < MIN_PAYLOAD_CHARS {
            return Err(ValidationError::new(
                "max_payload_chars",
                format!("must be at least {MIN_PAYLOAD_CHARS}"),
            ));
        }
        validate_recipient(&self.recipient)?;
        if self.filtering_enabled {
            for (field, set) in [
                ("topics", &self.topics),
                ("languages", &self.languages),
                ("countries", &self.countries),
            ] {
                if set.is_empty() {
                    return Err(ValidationError::new(
                        field,
                        "must not be empty while filtering is enabled",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Accepts `+15551234567` or `whatsapp:+15551234567`.
pub fn validate_recipient(recipient: &str) -> Result<(), ValidationError> {
    let number = recipient.strip_prefix("whatsapp:").unwrap_or(recipient);
    let Some(digits) = number.strip_prefix('+') else {
        return Err(ValidationError::new(
            "recipient",
            "must look like +1234567890 or whatsapp:+1234567890",
        ));
    };
    if !(7..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new(
            "recipient",
            "must contain 7 to 15 digits after '+'",
        ));
    }
    Ok(())
}

/// Partial update coming from the dashboard. Absent fields stay as they are.
///
/// Numeric fields are signed so that `0` and negative values reach validation
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigUpdate {
    pub topics: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub countries: Option<Vec<String>>,
    pub filtering_enabled: Option<bool>,
    pub interval_minutes: Option<i64>,
    pub recipient: Option<String>,
    pub max_articles: Option<i64>,
    pub max_payload_chars: Option<i64>,
}

impl ConfigUpdate {
    /// Produce the candidate configuration without touching `base`.
    pub fn apply_to(&self, base: &Configuration) -> Result<Configuration, ValidationError> {
        let mut next = base.clone();
        if let Some(v) = &self.topics {
            next.topics = clean_set(v, false);
        }
        if let Some(v) = &self.languages {
            next.languages = clean_set(v, true);
        }
        if let Some(v) = &self.countries {
            next.countries = clean_set(v, true);
        }
        if let Some(v) = self.filtering_enabled {
            next.filtering_enabled = v;
        }
        if let Some(v) = self.interval_minutes {
            next.interval_minutes = positive(v, "interval_minutes")?;
        }
        if let Some(v) = &self.recipient {
            next.recipient = v.trim().to_string();
        }
        if let Some(v) = self.max_articles {
            next.max_articles = positive(v, "max_articles")?;
        }
        if let Some(v) = self.max_payload_chars {
            next.max_payload_chars = positive(v, "max_payload_chars")? as usize;
        }
        next.validate()?;
        Ok(next)
    }
}

fn positive(v: i64, field: &'static str) -> Result<u32, ValidationError> {
    if v <= 0 {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }
    u32::try_from(v).map_err(|_| ValidationError::new(field, "is too large"))
}

fn clean_set(items: &[String], lowercase: bool) -> BTreeSet<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            if lowercase {
                s.to_ascii_lowercase()
            } else {
                s.to_string()
            }
        })
        .collect()
}

/// Owns the live [`Configuration`]. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct ConfigStore {
    inner: Mutex<Configuration>,
}

impl ConfigStore {
    /// Validates the initial configuration; an invalid one never gets stored.
    pub fn new(initial: Configuration) -> Result<Self, ValidationError> {
        initial.validate()?;
        Ok(Self {
            inner: Mutex::new(initial),
        })
    }

    pub fn get(&self) -> Configuration {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update(&self, update: &ConfigUpdate) -> Result<Configuration, ValidationError> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = update.apply_to(&guard)?;
        *guard = next.clone();
        tracing::info!(
            interval_minutes = next.interval_minutes,
            topics = ?next.topics,
            "configuration updated"
        );
        Ok(next)
    }
}
