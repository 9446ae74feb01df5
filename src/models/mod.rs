//! Data models for the test engine
//!
//! Values reported by tests, test definitions and the outcomes derived from them.

mod spec;
mod value;
mod verdict;

pub use spec::{normalize, Batch, Definition, Registrar, TestFn, TestSet, TestSpec};
pub use value::{
    classify, format_number, ErrorValue, HasCustomDump, HasEquals, HostObject, Kind, Map, Value,
};
pub use verdict::{CaseState, CaseSummary, Counters, SuiteSummary, Verdict};

pub(crate) use value::UNDEFINED;
