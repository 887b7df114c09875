//! Fixed-interval cycle trigger

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Holds at most one running timer. Starting again replaces the old one.
pub struct Scheduler {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Send a tick every period, first one after a full period.
    ///
    /// A timer that is already running is cancelled first.
    pub fn start(&mut self, ticks: mpsc::Sender<Instant>) {
        if let Some(previous) = self.handle.take() {
            log::warn!("Scheduler already running, replacing timer");
            previous.abort();
        }

        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let at = interval.tick().await;
                if ticks.send(at).await.is_err() {
                    break;
                }
            }
        }));

        log::debug!("Scheduler started, period {:?}", period);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::debug!("Scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_full_period() {
        let mut scheduler = Scheduler::new(PERIOD);
        let (tx, mut rx) = mpsc::channel(4);
        let started = Instant::now();

        scheduler.start(tx);
        rx.recv().await.unwrap();
        assert!(started.elapsed() >= PERIOD);

        rx.recv().await.unwrap();
        assert!(started.elapsed() >= PERIOD * 2);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_does_not_stack_timers() {
        let mut scheduler = Scheduler::new(PERIOD);
        let (tx, mut rx) = mpsc::channel(16);

        scheduler.start(tx.clone());
        scheduler.start(tx.clone());
        drop(tx);

        time::sleep(PERIOD * 3 + Duration::from_secs(1)).await;

        let mut ticks = 0;
        while rx.try_recv().is_ok() {
            ticks += 1;
        }
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_timer_releases_its_channel() {
        let mut scheduler = Scheduler::new(PERIOD);
        let (old_tx, mut old_rx) = mpsc::channel(4);
        let (new_tx, _new_rx) = mpsc::channel(4);

        scheduler.start(old_tx);
        scheduler.start(new_tx);

        assert!(old_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let mut scheduler = Scheduler::new(PERIOD);
        let (tx, mut rx) = mpsc::channel(4);

        scheduler.start(tx);
        scheduler.stop();

        assert!(!scheduler.is_running());
        assert!(rx.recv().await.is_none());
    }
}
