//! WhatsApp News Bot: binary entrypoint.
//! Loads configuration and credentials, starts the delivery loop and serves
//! the dashboard API.

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use whatsapp_news_bot::api::{self, AppState};
use whatsapp_news_bot::config::{settings, Credentials, RuntimeSettings};
use whatsapp_news_bot::metrics::Metrics;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("whatsapp_news_bot=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Missing credentials or an invalid config file stop the process here,
    // before the loop can run.
    let creds = Credentials::from_env().context("loading credentials")?;
    let bot = settings::load_default().context("loading bot configuration")?;
    let runtime = RuntimeSettings::from_env();
    tracing::info!(
        ?creds,
        bind = %runtime.bind_addr,
        interval_minutes = bot.config.interval_minutes,
        autostart = bot.autostart,
        "starting whatsapp news bot"
    );

    // Recorder first, so the autostart tick is counted.
    let metrics = Metrics::init()
        .inspect_err(|e| tracing::warn!(error = %e, "prometheus recorder not installed"))
        .ok();

    let delivery = whatsapp_news_bot::build_delivery_loop(&bot, &creds, &runtime)?;
    let _scheduler = delivery.spawn();
    if bot.autostart {
        delivery.start();
    }

    let mut app = api::create_router(AppState {
        delivery: delivery.clone(),
    });
    if let Some(m) = metrics {
        app = app.merge(m.router());
    }

    let listener = tokio::net::TcpListener::bind(&runtime.bind_addr)
        .await
        .with_context(|| format!("binding {}", runtime.bind_addr))?;
    tracing::info!(addr = %runtime.bind_addr, "dashboard listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serving dashboard")?;

    delivery.stop();
    Ok(())
}
