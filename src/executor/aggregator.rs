//! Suite aggregator
//!
//! Owns the counters and per-case state of one suite. Every settlement goes
//! through [`Aggregator::settle`], which judges the raw result, moves the case
//! through its state machine and forwards the verdict to the render sink.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::assertion::Judge;
use crate::models::{CaseState, CaseSummary, Counters, SuiteSummary, Value, Verdict};
use crate::output::{NullSink, RenderEvent, RenderSink};
use crate::utils::Timer;

/// Process-wide statistics shared by every suite of a harness
#[derive(Debug, Default)]
pub struct HarnessStats {
    suites: AtomicUsize,
    test_count: AtomicUsize,
    assertion_count: AtomicUsize,
}

impl HarnessStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suites started so far, including ones whose setup failed
    pub fn suites(&self) -> usize {
        self.suites.load(Ordering::SeqCst)
    }

    /// Cases ever started
    pub fn test_count(&self) -> usize {
        self.test_count.load(Ordering::SeqCst)
    }

    /// Verdicts ever settled
    pub fn assertion_count(&self) -> usize {
        self.assertion_count.load(Ordering::SeqCst)
    }

    /// Claim the next suite number, counting from 0
    pub(crate) fn next_suite(&self) -> usize {
        self.suites.fetch_add(1, Ordering::SeqCst)
    }
}

/// Index of a case within its suite
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CaseId(usize);

impl CaseId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct CaseRecord {
    label: String,
    state: CaseState,
    pending: usize,
    summary: Option<String>,
    verdicts: Vec<Verdict>,
}

impl CaseRecord {
    fn snapshot(&self) -> CaseSummary {
        CaseSummary {
            label: self.label.clone(),
            state: self.state,
            pending: self.pending,
            summary: self.summary.clone(),
            verdicts: self.verdicts.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Book {
    counters: Counters,
    cases: Vec<CaseRecord>,
    completed_at: Option<DateTime<Utc>>,
    duration_ms: u64,
}

/// Per-suite bookkeeping
pub struct Aggregator {
    id: usize,
    name: String,
    judge: Arc<Judge>,
    sink: Arc<dyn RenderSink>,
    stats: Arc<HarnessStats>,
    runtime: Option<Handle>,
    book: Mutex<Book>,
    settled: Notify,
    started_at: DateTime<Utc>,
    timer: Timer,
}

impl Aggregator {
    /// Create a suite with the default judge, no sink and private statistics
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            timer: Timer::start(),
            name,
            judge: Arc::new(Judge::default()),
            sink: Arc::new(NullSink),
            stats: Arc::new(HarnessStats::new()),
            runtime: Handle::try_current().ok(),
            book: Mutex::new(Book::default()),
            settled: Notify::new(),
            started_at: Utc::now(),
        }
    }

    pub fn with_judge(mut self, judge: Arc<Judge>) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_stats(mut self, stats: Arc<HarnessStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Runtime that deferred reports are spawned on
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &Arc<HarnessStats> {
        &self.stats
    }

    pub(crate) fn runtime(&self) -> Option<&Handle> {
        self.runtime.as_ref()
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn counters(&self) -> Counters {
        self.book().counters
    }

    pub fn case_state(&self, case: CaseId) -> Option<CaseState> {
        self.book().cases.get(case.0).map(|c| c.state)
    }

    pub fn pending(&self, case: CaseId) -> usize {
        self.book().cases.get(case.0).map_or(0, |c| c.pending)
    }

    pub fn is_completed(&self) -> bool {
        self.book().completed_at.is_some()
    }

    /// Completed with no report outstanding
    pub fn is_settled(&self) -> bool {
        let book = self.book();
        book.completed_at.is_some() && book.cases.iter().all(|c| c.pending == 0)
    }

    pub fn summary(&self) -> SuiteSummary {
        let book = self.book();
        SuiteSummary {
            id: self.id,
            name: self.name.clone(),
            counters: book.counters,
            cases: book.cases.iter().map(CaseRecord::snapshot).collect(),
            started_at: self.started_at,
            completed_at: book.completed_at,
            duration_ms: book.duration_ms,
        }
    }

    pub(crate) fn start(&self) {
        info!("Starting suite #{} {}", self.id, self.name);
        self.sink.suite_started(self.id, &self.name);
    }

    /// Open a case in the stand state; unnamed cases are labelled `test <N>`
    pub fn open_case(&self, name: Option<&str>) -> (CaseId, String) {
        self.stats.test_count.fetch_add(1, Ordering::SeqCst);
        let (case, label) = {
            let mut book = self.book();
            book.counters.open();
            let label = name
                .map(str::to_owned)
                .unwrap_or_else(|| format!("test {}", book.counters.total));
            book.cases.push(CaseRecord {
                label: label.clone(),
                state: CaseState::Stand,
                pending: 0,
                summary: None,
                verdicts: Vec::new(),
            });
            (CaseId(book.cases.len() - 1), label)
        };
        debug!("Case {} started in suite #{}", label, self.id);
        self.sink.case_started(self.id, &label);
        (case, label)
    }

    /// Register an outstanding report; a right case returns to stand
    pub fn register(&self, case: CaseId) {
        let mut book = self.book();
        let Book { counters, cases, .. } = &mut *book;
        if let Some(record) = cases.get_mut(case.0) {
            record.pending += 1;
            if record.state == CaseState::Right {
                counters.shift(CaseState::Right, CaseState::Stand);
                record.state = CaseState::Stand;
            }
        }
    }

    /// Settle one registered report.
    ///
    /// An unjudgeable result yields `None` and stays outstanding. `name`, when
    /// given, overrides any name carried by the result itself.
    pub fn settle(&self, case: CaseId, name: Option<String>, raw: &Value) -> Option<Verdict> {
        let (verdict, event) = {
            let mut book = self.book();
            let Book { counters, cases, .. } = &mut *book;
            let record = cases.get_mut(case.0)?;
            record.pending = record.pending.saturating_sub(1);

            let Some(mut verdict) = self.judge.judge(raw) else {
                record.pending += 1;
                debug!("Unjudgeable result in {}: {:?}", record.label, raw);
                return None;
            };
            if name.is_some() {
                verdict.name = name;
            }
            self.stats.assertion_count.fetch_add(1, Ordering::SeqCst);

            let next = match (record.state, verdict.result) {
                (CaseState::Wrong, _) => CaseState::Wrong,
                (_, false) => CaseState::Wrong,
                (CaseState::Stand, true) if record.pending == 0 => CaseState::Right,
                (state, true) => state,
            };
            if next != record.state {
                counters.shift(record.state, next);
                record.state = next;
            }

            let label = verdict.label();
            match &mut record.summary {
                None => record.summary = Some(label.clone()),
                Some(summary) => {
                    summary.push('\n');
                    if !verdict.result {
                        summary.push_str("[!] ");
                    }
                    summary.push_str(&label);
                }
            }
            record.verdicts.push(verdict.clone());

            debug!(
                "{} {}> {} {}",
                record.state.symbol(),
                record.label,
                label,
                counters
            );
            let event = RenderEvent {
                suite_id: self.id,
                suite_name: self.name.clone(),
                case_label: record.label.clone(),
                message: label,
                passed: verdict.result,
                state: record.state,
                counters: *counters,
            };
            (verdict, event)
        };

        self.sink.verdict(&event);
        self.settled.notify_waiters();
        Some(verdict)
    }

    /// Mark the scheduler as finished with this suite.
    ///
    /// Deferred reports may still settle afterwards and keep updating the
    /// counters.
    pub(crate) fn complete(&self) {
        {
            let mut book = self.book();
            book.completed_at = Some(Utc::now());
            book.duration_ms = self.timer.elapsed_ms();
        }
        let summary = self.summary();
        info!(
            "Suite #{} {} completed in {}ms: {}",
            self.id, self.name, summary.duration_ms, summary.counters
        );
        self.sink.suite_completed(&summary);
        self.settled.notify_waiters();
    }

    /// Wait until the suite is completed and no report is outstanding.
    ///
    /// Returns `false` if `limit` elapses first.
    pub async fn wait_settled(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_settled() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.is_settled();
            }
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("counters", &self.counters())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array;
    use crate::output::MemorySink;

    fn aggregator() -> (Aggregator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let aggregator = Aggregator::new(1, "Test 1").with_sink(sink.clone());
        (aggregator, sink)
    }

    fn report(aggregator: &Aggregator, case: CaseId, raw: Value) -> Option<Verdict> {
        aggregator.register(case);
        aggregator.settle(case, None, &raw)
    }

    #[test]
    fn test_open_case_labels() {
        let (aggregator, sink) = aggregator();
        let (_, first) = aggregator.open_case(Some("named"));
        let (_, second) = aggregator.open_case(None);
        assert_eq!(first, "named");
        assert_eq!(second, "test 2");
        assert_eq!(aggregator.counters().stand, 2);
        assert_eq!(aggregator.stats().test_count(), 2);
        assert_eq!(sink.cases().len(), 2);
    }

    #[test]
    fn test_true_verdict_moves_to_right() {
        let (aggregator, sink) = aggregator();
        let (case, _) = aggregator.open_case(Some("t1"));
        let verdict = report(&aggregator, case, true.into()).unwrap();
        assert!(verdict.result);
        assert_eq!(aggregator.case_state(case), Some(CaseState::Right));
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].counters.right, 1);
        assert_eq!(events[0].case_label, "t1");
    }

    #[test]
    fn test_right_needs_no_pending_reports() {
        let (aggregator, _) = aggregator();
        let (case, _) = aggregator.open_case(None);
        aggregator.register(case);
        aggregator.register(case);
        aggregator.settle(case, None, &true.into());
        assert_eq!(aggregator.case_state(case), Some(CaseState::Stand));
        aggregator.settle(case, None, &true.into());
        assert_eq!(aggregator.case_state(case), Some(CaseState::Right));
    }

    #[test]
    fn test_register_returns_right_to_stand() {
        let (aggregator, _) = aggregator();
        let (case, _) = aggregator.open_case(None);
        report(&aggregator, case, true.into());
        aggregator.register(case);
        assert_eq!(aggregator.case_state(case), Some(CaseState::Stand));
        let counters = aggregator.counters();
        assert_eq!((counters.stand, counters.right), (1, 0));
        assert!(counters.is_consistent());
    }

    #[test]
    fn test_wrong_is_sticky() {
        let (aggregator, _) = aggregator();
        let (case, _) = aggregator.open_case(None);
        report(&aggregator, case, true.into());
        report(&aggregator, case, false.into());
        report(&aggregator, case, true.into());
        aggregator.register(case);
        assert_eq!(aggregator.case_state(case), Some(CaseState::Wrong));
        let counters = aggregator.counters();
        assert_eq!((counters.wrong, counters.right, counters.stand), (1, 0, 0));
    }

    #[test]
    fn test_unjudgeable_stays_pending() {
        let (aggregator, sink) = aggregator();
        let (case, _) = aggregator.open_case(None);
        assert!(report(&aggregator, case, array![]).is_none());
        assert_eq!(aggregator.pending(case), 1);
        assert_eq!(aggregator.case_state(case), Some(CaseState::Stand));
        assert!(sink.events().is_empty());
        assert_eq!(aggregator.stats().assertion_count(), 0);
    }

    #[test]
    fn test_case_summary_accumulates() {
        let (aggregator, _) = aggregator();
        let (case, _) = aggregator.open_case(None);
        aggregator.register(case);
        aggregator.settle(case, Some("a".to_string()), &true.into());
        report(&aggregator, case, (1, 2).into());
        let summary = aggregator.summary();
        assert_eq!(
            summary.cases[0].summary.as_deref(),
            Some("a> (boolean) true\n[!] (number) 1 === (number) 2")
        );
        assert_eq!(summary.cases[0].verdicts.len(), 2);
    }

    #[test]
    fn test_counters_consistent_after_every_settlement() {
        let (aggregator, sink) = aggregator();
        let results = [true, false, true, true, false];
        for (i, result) in results.iter().enumerate() {
            let (case, _) = aggregator.open_case(None);
            report(&aggregator, case, (*result).into());
            if i % 2 == 0 {
                report(&aggregator, case, (!*result).into());
            }
        }
        assert!(sink.events().iter().all(|e| e.counters.is_consistent()));
        assert_eq!(aggregator.counters().total, results.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_settled() {
        let (aggregator, _) = aggregator();
        let aggregator = Arc::new(aggregator);
        let (case, _) = aggregator.open_case(None);
        aggregator.register(case);
        aggregator.complete();
        assert!(!aggregator.wait_settled(Duration::from_millis(10)).await);

        let settling = Arc::clone(&aggregator);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            settling.settle(case, None, &true.into());
        });
        assert!(aggregator.wait_settled(Duration::from_millis(100)).await);
        assert_eq!(aggregator.counters().right, 1);
    }
}
