use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::influx::InfluxClient;
use crate::series::{Metric, MetricSeries};

/// Single-writer view state. Only the poll task writes it, and only at
/// cycle boundaries; the HTTP handlers take read-only snapshots.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub loading: bool,
    pub error: bool,
    pub temperature: MetricSeries,
    pub humidity: MetricSeries,
    pub pressure: MetricSeries,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DashboardState {
    /// Initial state: loading until the first cycle completes.
    pub fn new() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }

    pub fn series(&self, metric: Metric) -> &MetricSeries {
        match metric {
            Metric::Temperature => &self.temperature,
            Metric::Humidity => &self.humidity,
            Metric::Pressure => &self.pressure,
        }
    }
}

pub type SharedState = Arc<RwLock<DashboardState>>;

pub fn shared_state() -> SharedState {
    Arc::new(RwLock::new(DashboardState::new()))
}

/// Source of metric series. The production implementation is
/// [`InfluxClient`]; tests substitute a stub.
pub trait MetricSource {
    fn fetch_series(&self, metric: Metric) -> impl Future<Output = Result<MetricSeries>> + Send;
}

impl MetricSource for InfluxClient {
    async fn fetch_series(&self, metric: Metric) -> Result<MetricSeries> {
        self.query_series(metric).await
    }
}

pub struct PollService<S> {
    source: S,
    state: SharedState,
    interval: Duration,
}

impl<S> PollService<S>
where
    S: MetricSource + Send + Sync + 'static,
{
    pub fn new(source: S, state: SharedState, interval: Duration) -> Self {
        Self {
            source,
            state,
            interval,
        }
    }

    /// Spawns the poll task. The first cycle runs immediately; cycles
    /// run back to back inside this one task, so a cycle that outlasts
    /// the interval delays the next tick instead of overlapping it.
    pub fn start(self, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        run_cycle(&self.source, &self.state).await;
                    }
                }
            }
        });
    }
}

/// One fetch cycle: all three metrics concurrently, no early abort.
/// The error flag clears at cycle start and is set again only if a
/// fetch in this cycle failed; a failed metric keeps its previous
/// series.
async fn run_cycle<S: MetricSource>(source: &S, state: &SharedState) {
    {
        let mut guard = state.write().await;
        guard.loading = true;
        guard.error = false;
    }

    let (temperature, humidity, pressure) = tokio::join!(
        source.fetch_series(Metric::Temperature),
        source.fetch_series(Metric::Humidity),
        source.fetch_series(Metric::Pressure),
    );

    let mut guard = state.write().await;
    let mut failed = false;

    match temperature {
        Ok(series) => {
            // The temperature series is the reference clock for the
            // page's "updated at" line.
            guard.updated_at = series.last().map(|point| point.time);
            guard.temperature = series;
        }
        Err(err) => {
            failed = true;
            tracing::warn!(metric = Metric::Temperature.field(), "fetch failed: {err:#}");
        }
    }
    match humidity {
        Ok(series) => guard.humidity = series,
        Err(err) => {
            failed = true;
            tracing::warn!(metric = Metric::Humidity.field(), "fetch failed: {err:#}");
        }
    }
    match pressure {
        Ok(series) => guard.pressure = series,
        Err(err) => {
            failed = true;
            tracing::warn!(metric = Metric::Pressure.field(), "fetch failed: {err:#}");
        }
    }

    guard.error = failed;
    guard.loading = false;
}
