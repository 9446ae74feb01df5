//! Async scheduler
//!
//! Drives the cases of a suite strictly one after another. With a delay of
//! zero every case runs back to back. Otherwise a case that may still report
//! is given until either its timeout expires or `delay` has passed since its
//! last completion signal, whichever comes first.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::aggregator::Aggregator;
use super::runner::CaseRunner;
use crate::models::TestSpec;

/// Sequential case driver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scheduler {
    delay: Duration,
    timeout: Duration,
}

impl Scheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            timeout: Self::default_timeout(delay),
        }
    }

    /// Override the per-case timeout; `None` keeps the default
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        if let Some(timeout) = timeout {
            self.timeout = timeout;
        }
        self
    }

    /// Ten times the delay, counting a zero delay as one millisecond
    pub fn default_timeout(delay: Duration) -> Duration {
        delay.max(Duration::from_millis(1)) * 10
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_sync(&self) -> bool {
        self.delay.is_zero()
    }

    /// Run every spec in order against `aggregator`
    pub async fn schedule(&self, aggregator: &Arc<Aggregator>, specs: &[TestSpec]) {
        for spec in specs {
            self.drive(aggregator, spec).await;
        }
    }

    async fn drive(&self, aggregator: &Arc<Aggregator>, spec: &TestSpec) {
        let deadline = Instant::now() + self.timeout;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = CaseRunner::run(aggregator, spec, &tx);
        drop(tx);

        if self.is_sync() || !outcome.is_async() {
            return;
        }

        let timeout = sleep_until(deadline);
        let settle = sleep_until(deadline);
        tokio::pin!(timeout, settle);
        let mut armed = false;
        let mut open = true;

        loop {
            tokio::select! {
                _ = &mut timeout => {
                    warn!(
                        "Case {} of suite #{} timed out after {}ms",
                        outcome.case.index() + 1,
                        aggregator.id(),
                        self.timeout.as_millis()
                    );
                    break;
                }
                _ = &mut settle, if armed => {
                    debug!("Case {} settled, advancing", outcome.case.index() + 1);
                    break;
                }
                signal = rx.recv(), if open => match signal {
                    Some(()) => {
                        settle.as_mut().reset(Instant::now() + self.delay);
                        armed = true;
                    }
                    None => open = false,
                },
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
