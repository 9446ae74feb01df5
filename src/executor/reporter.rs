//! Reporter handed to test callables
//!
//! A case reports results through its [`Reporter`]. Each report is first
//! registered (the case now has an outstanding result) and later settled,
//! either right away or after a delay on a timer task.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use super::aggregator::{Aggregator, CaseId};
use crate::models::Value;

type Callback = Box<dyn FnOnce() + Send>;

/// A result to be settled, optionally after a delay
pub struct Report {
    value: Value,
    delay: Duration,
    on_settled: Option<Callback>,
}

impl Report {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            delay: Duration::ZERO,
            on_settled: None,
        }
    }

    /// Settle after `delay` instead of immediately
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn after_ms(self, delay_ms: u64) -> Self {
        self.after(Duration::from_millis(delay_ms))
    }

    /// Run `f` once the report has been settled
    pub fn then<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_settled = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Report")
            .field("value", &self.value)
            .field("delay", &self.delay)
            .field("on_settled", &self.on_settled.is_some())
            .finish()
    }
}

struct ReporterInner {
    aggregator: Arc<Aggregator>,
    case: CaseId,
    completion: mpsc::UnboundedSender<()>,
    registrations: AtomicUsize,
}

impl ReporterInner {
    fn settle(&self, name: Option<String>, value: &Value, on_settled: Option<Callback>) {
        self.aggregator.settle(self.case, name, value);
        if let Some(f) = on_settled {
            f();
        }
        // the scheduler may have moved on already
        let _ = self.completion.send(());
    }
}

/// Handle through which one case reports its results.
///
/// Cheap to clone. A clone still alive after the callable returns marks the
/// case as asynchronous, so the scheduler waits for its reports.
#[derive(Clone)]
pub struct Reporter {
    inner: Arc<ReporterInner>,
}

impl Reporter {
    pub(crate) fn new(
        aggregator: Arc<Aggregator>,
        case: CaseId,
        completion: mpsc::UnboundedSender<()>,
    ) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                aggregator,
                case,
                completion,
                registrations: AtomicUsize::new(0),
            }),
        }
    }

    /// Register an unnamed report to be delivered through the returned slot
    pub fn slot(&self) -> Slot {
        self.open(None)
    }

    /// Register a named report to be delivered through the returned slot
    pub fn named(&self, name: impl Into<String>) -> Slot {
        self.open(Some(name.into()))
    }

    /// Report a result now
    pub fn report(&self, value: impl Into<Value>) {
        self.slot().report(value);
    }

    /// Report a named result now
    pub fn report_as(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.named(name).report(value);
    }

    /// Report a result, possibly deferred
    pub fn submit(&self, report: Report) {
        self.slot().submit(report);
    }

    /// Reports registered so far
    pub fn registrations(&self) -> usize {
        self.inner.registrations.load(Ordering::SeqCst)
    }

    pub fn case(&self) -> CaseId {
        self.inner.case
    }

    /// Whether clones of this reporter exist elsewhere
    pub(crate) fn is_retained(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }

    fn open(&self, name: Option<String>) -> Slot {
        self.inner.registrations.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregator.register(self.inner.case);
        Slot {
            inner: Arc::clone(&self.inner),
            name,
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("case", &self.inner.case)
            .field("registrations", &self.registrations())
            .finish()
    }
}

/// One registered report waiting for its result.
///
/// Dropping a slot without reporting leaves the case pending.
pub struct Slot {
    inner: Arc<ReporterInner>,
    name: Option<String>,
}

impl Slot {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Settle now
    pub fn report(self, value: impl Into<Value>) {
        self.inner.settle(self.name, &value.into(), None);
    }

    /// Settle now, or after the report's delay on a timer task
    pub fn submit(self, report: Report) {
        let Report {
            value,
            delay,
            on_settled,
        } = report;
        if delay.is_zero() {
            self.inner.settle(self.name, &value, on_settled);
            return;
        }

        let runtime = self
            .inner
            .aggregator
            .runtime()
            .cloned()
            .or_else(|| tokio::runtime::Handle::try_current().ok());
        match runtime {
            Some(runtime) => {
                let Slot { inner, name } = self;
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.settle(name, &value, on_settled);
                });
            }
            None => {
                warn!("No runtime for a deferred report, settling immediately");
                self.inner.settle(self.name, &value, on_settled);
            }
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("case", &self.inner.case)
            .field("name", &self.name)
            .finish()
    }
}
