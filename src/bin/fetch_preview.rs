//! Fetch news with the configured settings and print the formatted payloads
//! without sending anything. Only NEWSDATA_API_KEY is required.

use anyhow::Context;
use whatsapp_news_bot::config::{settings, RuntimeSettings};
use whatsapp_news_bot::format::MessageFormatter;
use whatsapp_news_bot::news::{NewsDataFetcher, NewsFetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let api_key = std::env::var("NEWSDATA_API_KEY").context("NEWSDATA_API_KEY missing")?;
    let bot = settings::load_default()?;
    let runtime = RuntimeSettings::from_env();

    let fetcher = NewsDataFetcher::new(
        runtime.newsdata_base_url.as_str(),
        api_key,
        runtime.http_timeout_secs,
    )?;
    let items = fetcher.fetch(&bot.config).await?;
    let formatter = MessageFormatter::new(bot.config.max_payload_chars);

    for (i, item) in items.iter().enumerate() {
        let payload = formatter.format(item);
        println!("--- #{} ({} chars) ---\n{payload}\n", i + 1, payload.chars().count());
    }
    println!("fetch-preview done: {} item(s)", items.len());
    Ok(())
}
