//! Harness entry point
//!
//! Turns test sets into suites and runs them. A process-wide harness backs
//! the free functions [`run_suite`] and [`set_enabled`].

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::aggregator::{Aggregator, HarnessStats};
use super::scheduler::Scheduler;
use crate::assertion::Judge;
use crate::config::HarnessConfig;
use crate::models::{normalize, Batch, Counters, Kind, Registrar, SuiteSummary, TestSet};
use crate::output::{LogSink, NullSink, RenderSink};
use crate::utils::{init_logger, Stopwatch};

/// Errors surfaced while setting up a suite
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Suite definition failed: {0:#}")]
    Setup(anyhow::Error),

    #[error("Test type of {0} is not supported")]
    UnsupportedTests(Kind),
}

static GLOBAL: Lazy<Harness> = Lazy::new(|| {
    let harness =
        Harness::from_config(HarnessConfig::load_or_default()).with_sink(Arc::new(LogSink::new()));
    harness.init_logging();
    harness
});

/// Run a suite on the process-wide harness.
///
/// Returns `Ok(None)` when the harness is disabled.
pub async fn run_suite(
    name: Option<&str>,
    tests: impl Into<TestSet>,
    delay_ms: Option<u64>,
    timeout_ms: Option<u64>,
) -> Result<Option<SuiteHandle>, HarnessError> {
    let mut suite = GLOBAL.builder();
    if let Some(name) = name {
        suite = suite.name(name);
    }
    if let Some(delay) = delay_ms {
        suite = suite.delay(delay);
    }
    if let Some(timeout) = timeout_ms {
        suite = suite.timeout(timeout);
    }
    suite.run(tests).await
}

/// Enable or disable the process-wide harness
pub fn set_enabled(enabled: bool) {
    GLOBAL.set_enabled(enabled);
}

/// Creates and runs suites that share statistics, judge and sink
#[derive(Clone)]
pub struct Harness {
    enabled: Arc<AtomicBool>,
    config: HarnessConfig,
    judge: Arc<Judge>,
    sink: Arc<dyn RenderSink>,
    stats: Arc<HarnessStats>,
}

impl Harness {
    /// Create a harness with default configuration and no sink
    pub fn new() -> Self {
        Self::from_config(HarnessConfig::default())
    }

    pub fn from_config(config: HarnessConfig) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(config.enabled)),
            judge: Arc::new(Judge::default().with_dumper(config.dump.clone())),
            sink: Arc::new(NullSink),
            stats: Arc::new(HarnessStats::new()),
            config,
        }
    }

    /// The process-wide harness
    pub fn global() -> &'static Harness {
        &GLOBAL
    }

    pub fn with_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_judge(mut self, judge: Judge) -> Self {
        self.judge = Arc::new(judge);
        self
    }

    /// Install the log subscriber at the configured level.
    ///
    /// `false` when a subscriber was already installed.
    pub fn init_logging(&self) -> bool {
        init_logger(self.config.log_level)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<HarnessStats> {
        &self.stats
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// When disabled, running a suite does nothing and yields no handle
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Start building a named suite
    pub fn suite(&self, name: impl Into<String>) -> SuiteBuilder<'_> {
        self.builder().name(name)
    }

    /// Run an unnamed suite with the configured delay and timeout
    pub async fn run(
        &self,
        tests: impl Into<TestSet>,
    ) -> Result<Option<SuiteHandle>, HarnessError> {
        self.builder().run(tests).await
    }

    fn builder(&self) -> SuiteBuilder<'_> {
        SuiteBuilder {
            harness: self,
            name: None,
            delay: self.config.delay(),
            timeout: self.config.timeout(),
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("enabled", &self.is_enabled())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Suite settings collected before running
#[derive(Debug)]
pub struct SuiteBuilder<'a> {
    harness: &'a Harness,
    name: Option<String>,
    delay: Duration,
    timeout: Option<Duration>,
}

impl SuiteBuilder<'_> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Scheduler delay; 0 runs every case synchronously
    pub fn delay(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    /// Per-case timeout in asynchronous mode; 0 keeps ten times the delay
    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        self
    }

    /// Normalize `tests` and run them as a new suite.
    ///
    /// The suite number is claimed first, so a broken definition still uses
    /// one up. Every collection is normalized before the first case runs.
    pub async fn run(
        self,
        tests: impl Into<TestSet>,
    ) -> Result<Option<SuiteHandle>, HarnessError> {
        let harness = self.harness;
        if !harness.is_enabled() {
            debug!("Harness disabled, skipping suite");
            return Ok(None);
        }

        let id = harness.stats.next_suite();
        let (definition_name, batches) = match tests.into() {
            TestSet::Collection(tests) => (None, vec![Batch::new(tests)]),
            TestSet::Define { name, define } => {
                let mut registrar = Registrar::default();
                let returned = define(&mut registrar).map_err(HarnessError::Setup)?;
                let mut batches = registrar.into_batches();
                if returned.is_truthy() {
                    batches.push(Batch::new(returned));
                }
                (name, batches)
            }
        };
        let plans = batches
            .into_iter()
            .map(|batch| Ok((normalize(&batch.tests)?, batch.on_complete)))
            .collect::<Result<Vec<_>, HarnessError>>()?;

        let name = self
            .name
            .or(definition_name)
            .unwrap_or_else(|| format!("Test {id}"));
        let aggregator = Arc::new(
            Aggregator::new(id, name)
                .with_judge(Arc::clone(&harness.judge))
                .with_sink(Arc::clone(&harness.sink))
                .with_stats(Arc::clone(&harness.stats)),
        );
        let scheduler = Scheduler::new(self.delay).with_timeout(self.timeout);
        aggregator.start();
        info!(
            "Suite #{} {}: {} batch(es), delay {}ms, timeout {}ms",
            id,
            aggregator.name(),
            plans.len(),
            scheduler.delay().as_millis(),
            scheduler.timeout().as_millis()
        );

        let mut stopwatch = Stopwatch::new();
        for (i, (specs, on_complete)) in plans.into_iter().enumerate() {
            scheduler.schedule(&aggregator, &specs).await;
            if let Some(on_complete) = on_complete {
                on_complete();
            }
            stopwatch.lap(format!("batch {}", i + 1));
        }
        debug!("Suite #{} timings:\n{}", id, stopwatch);

        aggregator.complete();
        Ok(Some(SuiteHandle { aggregator }))
    }
}

/// Handle to a suite that has been run.
///
/// Deferred reports may keep settling after the handle is returned; the
/// counters and summary always reflect the latest state.
#[derive(Clone, Debug)]
pub struct SuiteHandle {
    aggregator: Arc<Aggregator>,
}

impl SuiteHandle {
    pub fn id(&self) -> usize {
        self.aggregator.id()
    }

    pub fn name(&self) -> &str {
        self.aggregator.name()
    }

    pub fn counters(&self) -> Counters {
        self.aggregator.counters()
    }

    pub fn summary(&self) -> SuiteSummary {
        self.aggregator.summary()
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Wait until no report is outstanding; `false` if `limit` elapses first
    pub async fn wait_settled(&self, limit: Duration) -> bool {
        self.aggregator.wait_settled(limit).await
    }
}
