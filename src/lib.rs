//! utest - minimal unit test execution engine
//!
//! Runs named test callables, judges every reported result against a small
//! assertion grammar and keeps per-suite right/wrong/stand tallies. Cases may
//! report synchronously or later from timer tasks; the scheduler drives them
//! one at a time with a delay/timeout race.
//!
//! ```no_run
//! use utest::{array, Harness, TestFn};
//!
//! # async fn demo() -> Result<(), utest::HarnessError> {
//! let harness = Harness::new();
//! let suite = harness
//!     .run(array![
//!         "t1", TestFn::new(|_| Ok(true.into())),
//!         "t2", TestFn::new(|_| Ok((1, 1).into())),
//!     ])
//!     .await?;
//! # let _ = suite;
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod config;
pub mod executor;
pub mod models;
pub mod output;
pub mod utils;

pub use assertion::{judge, multi, raise, safe, Dumper, Judge, OperatorSet};
pub use config::HarnessConfig;
pub use executor::{
    run_suite, set_enabled, Aggregator, Harness, HarnessError, HarnessStats, Report, Reporter,
    Slot, SuiteBuilder, SuiteHandle,
};
pub use models::{
    classify, CaseState, Counters, ErrorValue, HasCustomDump, HasEquals, HostObject, Kind, Map,
    Registrar, SuiteSummary, TestFn, TestSet, TestSpec, Value, Verdict,
};
pub use output::{RenderEvent, RenderSink};

/// Build an array [`Value`] from a list of expressions convertible into values
#[macro_export]
macro_rules! array {
    () => {
        $crate::Value::Array(::std::vec::Vec::new())
    };
    ($($item:expr),+ $(,)?) => {
        $crate::Value::Array(::std::vec![$(::std::option::Option::Some($crate::Value::from($item))),+])
    };
}

/// Build a mapping [`Value`] from `key => value` pairs, keeping their order
#[macro_export]
macro_rules! map {
    () => {
        $crate::Value::Map($crate::Map::new())
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Map::new();
        $(map.insert($key, $crate::Value::from($value));)+
        $crate::Value::Map(map)
    }};
}
