//! Assertion engine
//!
//! Turns raw reported results into verdicts. A raw result is a boolean, an
//! array of one to three elements (`[actual]`, `[actual, expected]` or
//! `[left, op, right]`), or an `{ expr, error, name }` wrapper around one.

pub mod dump;
mod helpers;
pub mod ops;

pub use dump::Dumper;
pub use helpers::{multi, raise, safe};
pub use ops::{Operator, OperatorSet};

use once_cell::sync::Lazy;

use crate::models::{classify, Kind, Value, Verdict};

static DEFAULT_JUDGE: Lazy<Judge> = Lazy::new(Judge::default);

/// Judge a raw result with the built-in operators and default dumper
pub fn judge(raw: &Value) -> Option<Verdict> {
    DEFAULT_JUDGE.judge(raw)
}

/// Evaluates raw results against the operator set
#[derive(Clone, Debug, Default)]
pub struct Judge {
    operators: OperatorSet,
    dumper: Dumper,
}

impl Judge {
    pub fn new(operators: OperatorSet, dumper: Dumper) -> Self {
        Self { operators, dumper }
    }

    pub fn with_dumper(mut self, dumper: Dumper) -> Self {
        self.dumper = dumper;
        self
    }

    pub fn with_operators(mut self, operators: OperatorSet) -> Self {
        self.operators = operators;
        self
    }

    pub fn operators(&self) -> &OperatorSet {
        &self.operators
    }

    pub fn operators_mut(&mut self) -> &mut OperatorSet {
        &mut self.operators
    }

    pub fn dumper(&self) -> &Dumper {
        &self.dumper
    }

    /// Judge one raw result; `None` when it has no recognizable shape
    pub fn judge(&self, raw: &Value) -> Option<Verdict> {
        if raw.is_nullish() {
            return None;
        }
        let (expr, error, name) = if classify(raw) == Kind::Object {
            (
                raw.get("expr").unwrap_or_default(),
                raw.get("error"),
                raw.get("name"),
            )
        } else {
            (raw.clone(), None, None)
        };

        let verdict = self.evaluate(&expr, error.as_ref())?;
        Some(match name {
            Some(Value::String(name)) => verdict.with_name(name),
            _ => verdict,
        })
    }

    fn evaluate(&self, expr: &Value, error: Option<&Value>) -> Option<Verdict> {
        if let Some(error) = error.filter(|e| e.is_truthy()) {
            return Some(Verdict::fail(self.dumper.dump(error)));
        }
        if let Value::Bool(result) = expr {
            return Some(Verdict {
                result: *result,
                message: self.describe(expr),
                name: None,
            });
        }
        if classify(expr) != Kind::Array {
            return None;
        }
        let items: Vec<Value> = expr
            .elements()?
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();

        let (result, message) = match items.as_slice() {
            [] => return None,
            [actual] => (
                ops::strict_equals(actual, &Value::Bool(true)),
                self.describe(actual),
            ),
            [actual, expected] => (
                ops::strict_equals(actual, expected),
                self.message(actual, "===", expected),
            ),
            [left, op, right, ..] => {
                let op = op.to_js_string();
                (
                    self.operators.apply(&op, left, right),
                    self.message(left, &op, right),
                )
            }
        };
        Some(Verdict {
            result,
            message,
            name: None,
        })
    }

    /// `(kind) dump`
    pub fn describe(&self, value: &Value) -> String {
        format!("({}) {}", classify(value), self.dumper.dump(value))
    }

    /// `(kind) dump op (kind) dump`
    pub fn message(&self, left: &Value, op: &str, right: &Value) -> String {
        format!("{} {} {}", self.describe(left), op, self.describe(right))
    }
}
