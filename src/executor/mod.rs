//! Test execution engine
//!
//! Suites are run by a [`Harness`]: cases are driven one at a time by the
//! [`Scheduler`], report through a [`Reporter`], and are tallied by an
//! [`Aggregator`].

mod aggregator;
mod harness;
mod reporter;
mod runner;
mod scheduler;

pub use aggregator::{Aggregator, CaseId, HarnessStats};
pub use harness::{run_suite, set_enabled, Harness, HarnessError, SuiteBuilder, SuiteHandle};
pub use reporter::{Report, Reporter, Slot};
pub use runner::{CaseOutcome, CaseRunner};
pub use scheduler::Scheduler;

pub(crate) use runner::call_guarded;
