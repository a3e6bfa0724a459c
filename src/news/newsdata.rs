use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{normalize_text, NewsFetcher, NewsItem};
use crate::error::FetchError;
use crate::store::Configuration;

// --- wire types (NewsData.io /api/1/news) ---

#[derive(Debug, Deserialize)]
struct NewsDataResponse {
    status: String,
    #[serde(default)]
    results: Option<Results>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Results {
    Articles(Vec<Article>),
    Error(ApiErrorBody),
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source_id: Option<String>,
    source_name: Option<String>,
}

/// NewsData.io returns `2024-05-01 12:34:56` (UTC); tolerate RFC 3339 too.
fn parse_pub_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
        .map(|n| n.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}

impl Article {
    fn into_item(self) -> Option<NewsItem> {
        let title = normalize_text(self.title.as_deref()?);
        let url = self.link?.trim().to_string();
        if title.is_empty() || url.is_empty() {
            return None;
        }
        let source = self
            .source_name
            .or(self.source_id)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        Some(NewsItem {
            title,
            summary: self
                .description
                .as_deref()
                .map(normalize_text)
                .unwrap_or_default(),
            url,
            source,
            published_at: self.pub_date.as_deref().and_then(parse_pub_date),
        })
    }
}

pub struct NewsDataFetcher {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl NewsDataFetcher {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("whatsapp-news-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_secs,
        })
    }

    /// Query string for a configuration. Topics are OR-ed together.
    pub fn query_params(&self, config: &Configuration) -> Vec<(&'static str, String)> {
        let mut params = vec![("apikey", self.api_key.clone())];
        if config.filtering_enabled {
            let join = |set: &std::collections::BTreeSet<String>, sep: &str| {
                set.iter().cloned().collect::<Vec<_>>().join(sep)
            };
            params.push(("q", join(&config.topics, " OR ")));
            params.push(("country", join(&config.countries, ",")));
            params.push(("language", join(&config.languages, ",")));
        }
        params
    }

    /// The request url carries the api key, so it never reaches the error text.
    fn transport(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout_secs)
        } else {
            FetchError::Transport(e.without_url())
        }
    }
}

#[async_trait]
impl NewsFetcher for NewsDataFetcher {
    async fn fetch(&self, config: &Configuration) -> Result<Vec<NewsItem>, FetchError> {
        let url = format!("{}/api/1/news", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&self.query_params(config))
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = resp.status();
        tracing::debug!(%status, "newsdata response");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Unauthorized)
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            _ => {}
        }

        let body = resp.text().await.map_err(|e| self.transport(e))?;
        let parsed: NewsDataResponse = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(_) if !status.is_success() => return Err(FetchError::Http(status)),
            Err(e) => return Err(FetchError::Decode(e.to_string())),
        };

        if parsed.status.eq_ignore_ascii_case("error") {
            let message = match parsed.results {
                Some(Results::Error(ApiErrorBody { message: Some(m) })) => m,
                _ => "unknown API error".to_string(),
            };
            return Err(FetchError::Api(message));
        }
        if !status.is_success() {
            return Err(FetchError::Http(status));
        }

        let articles = match parsed.results {
            Some(Results::Articles(a)) => a,
            Some(Results::Error(_)) => {
                return Err(FetchError::Decode("unexpected results object".into()))
            }
            None => Vec::new(),
        };
        let raw = articles.len();
        let items: Vec<NewsItem> = articles
            .into_iter()
            .filter_map(Article::into_item)
            .take(config.max_articles as usize)
            .collect();
        if items.is_empty() {
            tracing::warn!("no news articles found for the given criteria");
        } else {
            tracing::info!(fetched = items.len(), returned = raw, "fetched news");
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "newsdata"
    }
}
