use anyhow::Result;
use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder (first call only) and
    /// describe the pipeline counters.
    pub fn init() -> Result<Self> {
        let handle = HANDLE.get_or_try_init(|| -> Result<PrometheusHandle> {
            let handle = PrometheusBuilder::new().install_recorder()?;
            describe_counter!("races_scored_total", "Races that produced picks");
            describe_counter!("races_skipped_total", "Races left out, labelled by reason");
            describe_counter!("focus_races_total", "Scored races flagged as focus races");
            Ok(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
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
