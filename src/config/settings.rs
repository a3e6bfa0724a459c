// src/config/settings.rs
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StartupError;
use crate::store::{ConfigUpdate, Configuration};

const ENV_PATH: &str = "BOT_CONFIG_PATH";
const ENV_RECIPIENT: &str = "BOT_RECIPIENT";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_NEWSDATA_BASE_URL: &str = "https://newsdata.io";
pub const DEFAULT_TWILIO_BASE_URL: &str = "https://api.twilio.com";

/// Static bot configuration as written in `config/bot.toml` (or `.json`).
/// Every field is optional; missing ones fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub recipient: Option<String>,
    pub topics: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub countries: Option<Vec<String>>,
    pub filtering_enabled: Option<bool>,
    pub interval_minutes: Option<i64>,
    pub max_articles: Option<i64>,
    pub max_payload_chars: Option<i64>,
    /// Start the delivery loop right after boot. Defaults to `true`.
    pub autostart: Option<bool>,
}

/// What the process starts with.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub config: Configuration,
    pub autostart: bool,
}

impl FileConfig {
    /// Resolve defaults, the `BOT_RECIPIENT` fallback, and validate.
    pub fn into_settings(self) -> Result<BotSettings, StartupError> {
        let recipient = self
            .recipient
            .clone()
            .filter(|r| !r.trim().is_empty())
            .or_else(|| std::env::var(ENV_RECIPIENT).ok())
            .unwrap_or_default();
        let base = Configuration::with_recipient(recipient.trim());
        let update = ConfigUpdate {
            topics: self.topics,
            languages: self.languages,
            countries: self.countries,
            filtering_enabled: self.filtering_enabled,
            interval_minutes: self.interval_minutes,
            recipient: None,
            max_articles: self.max_articles,
            max_payload_chars: self.max_payload_chars,
        };
        let config = update.apply_to(&base)?;
        Ok(BotSettings {
            config,
            autostart: self.autostart.unwrap_or(true),
        })
    }
}

/// Load from an explicit path. TOML or JSON, picked by extension.
pub fn load_from(path: &Path) -> Result<BotSettings, StartupError> {
    let source_err = |message: String| StartupError::ConfigSource {
        path: path.display().to_string(),
        message,
    };
    let content = fs::read_to_string(path).map_err(|e| source_err(e.to_string()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let file: FileConfig = match ext.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| source_err(e.to_string()))?,
        _ => toml::from_str(&content).map_err(|e| source_err(e.to_string()))?,
    };
    file.into_settings()
}

/// Resolution order:
/// 1) $BOT_CONFIG_PATH
/// 2) config/bot.toml
/// 3) config/bot.json
/// 4) built-in defaults (recipient from $BOT_RECIPIENT)
pub fn load_default() -> Result<BotSettings, StartupError> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(&p);
        if !pb.exists() {
            return Err(StartupError::ConfigSource {
                path: p,
                message: format!("{ENV_PATH} points to a non-existent path"),
            });
        }
        return load_from(&pb);
    }
    for candidate in ["config/bot.toml", "config/bot.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    tracing::info!("no bot config file found, using defaults");
    FileConfig::default().into_settings()
}

/// Process-level knobs that only come from the environment.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub bind_addr: String,
    pub http_timeout_secs: u64,
    pub newsdata_base_url: String,
    pub twilio_base_url: String,
}

impl RuntimeSettings {
    pub fn from_env() -> Self {
        let http_timeout_secs = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        Self {
            bind_addr: env_or("BIND_ADDR", DEFAULT_BIND_ADDR),
            http_timeout_secs,
            newsdata_base_url: env_or("NEWSDATA_BASE_URL", DEFAULT_NEWSDATA_BASE_URL),
            twilio_base_url: env_or("TWILIO_BASE_URL", DEFAULT_TWILIO_BASE_URL),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_fields_override_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
recipient = "whatsapp:+15550001111"
topics = ["tech", " ai "]
interval_minutes = 15
autostart = false
"#,
        )
        .unwrap();
        let s = file.into_settings().unwrap();
        assert_eq!(s.config.interval_minutes, 15);
        assert!(s.config.topics.contains("ai"));
        assert!(s.config.countries.contains("us"));
        assert!(!s.autostart);
    }

    #[test]
    fn bad_interval_is_a_startup_error() {
        let file: FileConfig =
            toml::from_str("recipient = \"+15550001111\"\ninterval_minutes = 0").unwrap();
        assert!(matches!(
            file.into_settings(),
            Err(StartupError::InvalidConfig(_))
        ));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);
        env::set_var(ENV_RECIPIENT, "+15550002222");

        // No files: defaults + recipient from env
        let s = load_default().unwrap();
        assert_eq!(s.config.recipient, "+15550002222");
        assert_eq!(s.config.interval_minutes, 60);

        // Env path wins
        let p = tmp.path().join("custom.json");
        fs::write(&p, r#"{"recipient":"+15550003333","max_articles":5}"#).unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        let s2 = load_default().unwrap();
        assert_eq!(s2.config.recipient, "+15550003333");
        assert_eq!(s2.config.max_articles, 5);

        env::remove_var(ENV_PATH);
        env::remove_var(ENV_RECIPIENT);
        env::set_current_dir(&old).unwrap();
    }
}
