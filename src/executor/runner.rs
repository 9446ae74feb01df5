//! Test case runner
//!
//! Runs one callable with its own reporter and settles whatever it returns.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::aggregator::{Aggregator, CaseId};
use super::reporter::Reporter;
use crate::models::{classify, ErrorValue, Kind, Map, TestFn, TestSpec, Value};

/// What the scheduler needs to know about a finished callable
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaseOutcome {
    pub case: CaseId,
    /// Reports registered through the reporter while the callable ran
    pub registrations: usize,
    /// The callable kept a reporter clone, so it may report later
    pub retained: bool,
}

impl CaseOutcome {
    /// Whether the case may still deliver reports
    pub fn is_async(&self) -> bool {
        self.registrations > 0 || self.retained
    }
}

/// Call a test body, turning an `Err` or a panic into an error value
pub(crate) fn call_guarded(callable: &TestFn, reporter: Reporter) -> Result<Value, ErrorValue> {
    match panic::catch_unwind(AssertUnwindSafe(|| callable.call(reporter))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(ErrorValue::from_error(&error)),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("Test callable panicked: {}", message);
            Err(ErrorValue::new("Panic", message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs single cases against an aggregator
#[derive(Clone, Copy, Debug, Default)]
pub struct CaseRunner;

impl CaseRunner {
    /// Run one case.
    ///
    /// The case is opened before the callable executes. Every settlement made
    /// through the case's reporter sends one signal on `completion`.
    pub fn run(
        aggregator: &Arc<Aggregator>,
        spec: &TestSpec,
        completion: &mpsc::UnboundedSender<()>,
    ) -> CaseOutcome {
        let (case, label) = aggregator.open_case(spec.name.as_deref());
        let reporter = Reporter::new(Arc::clone(aggregator), case, completion.clone());

        let returned = call_guarded(&spec.callable, reporter.clone());
        let outcome = CaseOutcome {
            case,
            registrations: reporter.registrations(),
            retained: reporter.is_retained(),
        };
        debug!(
            "Case {} returned ({} reports registered, retained: {})",
            label, outcome.registrations, outcome.retained
        );

        match returned {
            Ok(value) => Self::settle_returned(aggregator, case, value),
            Err(error) => {
                let mut capture = Map::new();
                capture.insert("error", error);
                aggregator.register(case);
                aggregator.settle(case, None, &Value::Map(capture));
            }
        }
        outcome
    }

    fn settle_returned(aggregator: &Aggregator, case: CaseId, value: Value) {
        if value.is_nullish() {
            return;
        }
        if classify(&value) != Kind::Object {
            aggregator.register(case);
            aggregator.settle(case, None, &value);
            return;
        }

        let entries = value.entries();
        let positional = entries
            .iter()
            .enumerate()
            .all(|(i, (key, _))| *key == i.to_string());
        // register everything first so the case cannot turn right early
        for _ in &entries {
            aggregator.register(case);
        }
        for (i, (key, raw)) in entries.into_iter().enumerate() {
            let name = if positional {
                format!("test {}", i + 1)
            } else {
                key
            };
            aggregator.settle(case, Some(name), &raw);
        }
    }
}
