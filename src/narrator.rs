//! Cosmetic phase labels shown while a run is outstanding.
//!
//! The labels say nothing about real remote progress; they only rotate on a
//! fixed period so the operator can see the client is alive.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

pub const PHASE_LABELS: [&str; 6] = [
    "Cloning repository",
    "Running tests",
    "Analyzing failures",
    "Applying fixes",
    "Pushing commits",
    "Verifying CI",
];

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Rotating phase label bound to one submission at a time.
///
/// The ticker only exists between `start` and `stop`; while stopped, `tick`
/// never resolves.
#[derive(Debug)]
pub struct Narrator {
    period: Duration,
    index: usize,
    ticker: Option<Interval>,
}

impl Narrator {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            index: 0,
            ticker: None,
        }
    }

    /// Rewind to the first label and (re)arm the ticker. Returns the first label.
    pub fn start(&mut self) -> &'static str {
        self.index = 0;
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.current()
    }

    pub fn stop(&mut self) {
        self.ticker = None;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn current(&self) -> &'static str {
        PHASE_LABELS[self.index]
    }

    fn advance(&mut self) -> &'static str {
        self.index = (self.index + 1) % PHASE_LABELS.len();
        self.current()
    }

    /// Wait for the next period and return the label it advanced to.
    ///
    /// Cancel safe: dropping the future before it resolves loses no tick.
    pub async fn tick(&mut self) -> &'static str {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
                self.advance()
            }
            None => futures::future::pending().await,
        }
    }
}
