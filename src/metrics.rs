use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        describe_counter!("bot_ticks_total", "Ticks started.");
        describe_counter!("bot_ticks_skipped_total", "Ticks skipped because one was running.");
        describe_counter!("bot_fetch_errors_total", "News fetch failures.");
        describe_counter!("bot_messages_sent_total", "Messages accepted by the messaging API.");
        describe_counter!("bot_messages_failed_total", "Messages that failed to dispatch.");
        describe_histogram!("bot_tick_duration_ms", "Tick duration in milliseconds.");
        describe_gauge!("bot_last_tick_ts", "Unix ts of the last finished tick.");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
