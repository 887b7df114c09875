//! Sampling aggregator
//!
//! Turns the stream of per-account oracle updates into one rolling average
//! per completed cycle. A cycle completes once `samples_per_account` matching
//! samples per basket entry have arrived; the average is taken over every
//! sample still retained, so the window widens up to the retention cap.
//! Each feed start opens a new subscription generation; updates stamped with
//! any other generation are stale and never counted.

use crate::chart::ChartPoint;
use crate::config::Config;
use crate::error::{IndexerError, Result};
use crate::oracle::{PriceFeed, PriceSample, PriceUpdate, UpdateSink};
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Accounts to watch. Duplicates weight an account by repetition.
    pub basket: Vec<Pubkey>,
    pub cycle_interval_secs: u64,
    pub samples_per_account: usize,
    pub retention_multiplier: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            basket: Vec::new(),
            cycle_interval_secs: 30,
            samples_per_account: 2,
            retention_multiplier: 2,
        }
    }
}

impl AggregatorConfig {
    pub fn for_basket(basket: Vec<Pubkey>) -> Self {
        Self {
            basket,
            ..Self::default()
        }
    }

    pub fn from_config(config: &Config, basket: Vec<Pubkey>) -> Self {
        Self {
            basket,
            cycle_interval_secs: config.cycle_interval_secs,
            samples_per_account: config.samples_per_account,
            retention_multiplier: config.retention_multiplier,
        }
    }

    /// Matching samples that complete one cycle
    pub fn target(&self) -> usize {
        self.samples_per_account * self.basket.len()
    }

    /// Buffer length above which one batch of `target` samples is evicted
    pub fn retention_cap(&self) -> usize {
        self.retention_multiplier * self.target()
    }
}

pub struct SamplingAggregator<F: PriceFeed> {
    config: AggregatorConfig,
    feed: F,
    buffer: VecDeque<PriceSample>,
    match_count: usize,
    collecting: bool,
    generation: u64,
    cycles_completed: u64,
}

impl<F: PriceFeed> SamplingAggregator<F> {
    /// Create an aggregator and register `sink` with the feed.
    ///
    /// The receiving end of `sink` must route updates back into
    /// [`SamplingAggregator::handle_update`].
    pub fn new(config: AggregatorConfig, mut feed: F, sink: UpdateSink) -> Self {
        feed.register(sink);
        Self {
            config,
            feed,
            buffer: VecDeque::new(),
            match_count: 0,
            collecting: false,
            generation: 0,
            cycles_completed: 0,
        }
    }

    /// Begin one monitoring cycle.
    ///
    /// If the previous cycle has not reached its target the subscription is
    /// left running and its partial match count carries over.
    pub fn run_cycle(&mut self) -> Result<()> {
        if self.config.basket.is_empty() {
            return Err(IndexerError::config("cannot monitor an empty basket"));
        }

        if self.collecting && self.feed.is_running() {
            log::warn!(
                "Cycle still open ({}/{} samples), keeping subscription",
                self.match_count,
                self.config.target()
            );
            return Ok(());
        }

        let generation = self.generation + 1;
        self.feed.start(generation)?;
        self.generation = generation;
        self.collecting = true;
        log::debug!(
            "Cycle started (generation {}), target {} samples",
            generation,
            self.config.target()
        );
        Ok(())
    }

    /// Price-change handler. Returns a chart point when this update completes a cycle.
    pub fn handle_update(&mut self, update: PriceUpdate) -> Option<ChartPoint> {
        if !self.collecting {
            return None;
        }
        if update.generation != self.generation {
            log::debug!(
                "Dropping update from stale subscription generation {}",
                update.generation
            );
            return None;
        }

        let sample = update.sample;
        if !sample.is_valid() {
            log::debug!(
                "No current price for {} ({}), skipping",
                sample.account_id,
                update.product.symbol.as_deref().unwrap_or("unknown")
            );
            return None;
        }

        if !self.config.basket.contains(&sample.account_id) {
            return None;
        }

        self.buffer.push_back(sample);
        self.match_count += 1;

        if self.match_count >= self.config.target() {
            Some(self.complete_cycle())
        } else {
            None
        }
    }

    fn complete_cycle(&mut self) -> ChartPoint {
        self.feed.stop();
        self.collecting = false;
        self.match_count = 0;

        // Non-empty: target is positive and was just reached
        let sum: f64 = self.buffer.iter().filter_map(|s| s.price).sum();
        let mean = sum / self.buffer.len() as f64;
        let point = ChartPoint::new(round_cents(mean), Utc::now());

        if self.buffer.len() > self.config.retention_cap() {
            self.buffer.drain(..self.config.target());
        }

        self.cycles_completed += 1;
        log::info!(
            "Cycle {} complete: average {:.2} over {} samples",
            self.cycles_completed,
            point.average_price,
            self.buffer.len()
        );

        point
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Stop the feed, abandoning any open cycle
    pub fn shutdown(&mut self) {
        self.feed.stop();
        self.collecting = false;
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn samples(&self) -> impl Iterator<Item = &PriceSample> {
        self.buffer.iter()
    }

    pub fn match_count(&self) -> usize {
        self.match_count
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Generation of the current (or last) feed subscription
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
