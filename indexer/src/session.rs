//! Monitoring session: one aggregator, one scheduler, one chart series
//!
//! Ticks and price updates are handled on a single task in arrival order,
//! so the aggregator state needs no locking.

use crate::aggregator::{AggregatorConfig, SamplingAggregator};
use crate::chart::{ChartPoint, ChartSeries};
use crate::error::{IndexerError, Result};
use crate::oracle::{PriceFeed, PriceUpdate};
use crate::scheduler::Scheduler;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct MonitorSession<F: PriceFeed> {
    aggregator: SamplingAggregator<F>,
    scheduler: Scheduler,
    updates: mpsc::UnboundedReceiver<PriceUpdate>,
    series: ChartSeries,
    points_out: Option<mpsc::UnboundedSender<ChartPoint>>,
}

impl<F: PriceFeed> MonitorSession<F> {
    /// Fails on an empty basket; the scheduler is never started for one.
    pub fn new(name: impl Into<String>, config: AggregatorConfig, feed: F) -> Result<Self> {
        if config.basket.is_empty() {
            return Err(IndexerError::config("basket has no accounts to monitor"));
        }
        if config.cycle_interval_secs == 0 {
            return Err(IndexerError::config("cycle interval must be positive"));
        }

        let period = Duration::from_secs(config.cycle_interval_secs);
        let (sink, updates) = mpsc::unbounded_channel();

        Ok(Self {
            aggregator: SamplingAggregator::new(config, feed, sink),
            scheduler: Scheduler::new(period),
            updates,
            series: ChartSeries::new(name),
            points_out: None,
        })
    }

    /// Forward each emitted point to `out` as well as the session series
    pub fn with_point_sink(mut self, out: mpsc::UnboundedSender<ChartPoint>) -> Self {
        self.points_out = Some(out);
        self
    }

    /// Run until `shutdown` resolves, returning the recorded series
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> ChartSeries {
        let (tick_tx, mut ticks) = mpsc::channel(4);
        self.scheduler.start(tick_tx);
        tokio::pin!(shutdown);

        log::info!(
            "Monitoring '{}': {} accounts, cycle every {:?}",
            self.series.basket,
            self.aggregator.config().basket.len(),
            self.scheduler.period()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(_) = ticks.recv() => {
                    if let Err(e) = self.aggregator.run_cycle() {
                        log::error!("Cycle failed to start: {}", e);
                    }
                }
                Some(update) = self.updates.recv() => {
                    if let Some(point) = self.aggregator.handle_update(update) {
                        self.record(point);
                    }
                }
                else => break,
            }
        }

        self.scheduler.stop();
        self.aggregator.shutdown();
        log::info!(
            "Session '{}' ended with {} chart points",
            self.series.basket,
            self.series.len()
        );

        self.series
    }

    fn record(&mut self, point: ChartPoint) {
        log::info!(
            "[{}] {} average {:.2}",
            self.series.basket,
            point.label(),
            point.average_price
        );

        let closed = self
            .points_out
            .as_ref()
            .is_some_and(|out| out.send(point).is_err());
        if closed {
            self.points_out = None;
        }
        self.series.push(point);
    }
}
