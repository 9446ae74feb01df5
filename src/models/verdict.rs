//! Verdicts, case states and suite tallies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of judging one reported result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub result: bool,
    pub message: String,
    pub name: Option<String>,
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            result: true,
            message: message.into(),
            name: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            result: false,
            message: message.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Message prefixed with the verdict name, as shown in case summaries
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{}> {}", name, self.message),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = if self.result { "✓" } else { "✗" };
        write!(f, "{} {}", symbol, self.label())
    }
}

/// Aggregate state of a case
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseState {
    /// Not yet concluded
    Stand,
    Right,
    /// Absorbing
    Wrong,
}

impl CaseState {
    pub fn symbol(&self) -> &'static str {
        match self {
            CaseState::Stand => "○",
            CaseState::Right => "✓",
            CaseState::Wrong => "✗",
        }
    }

    pub fn is_concluded(&self) -> bool {
        !matches!(self, CaseState::Stand)
    }
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseState::Stand => write!(f, "stand"),
            CaseState::Right => write!(f, "right"),
            CaseState::Wrong => write!(f, "wrong"),
        }
    }
}

/// Per-suite tallies; `stand + right + wrong == total` after every update
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub stand: usize,
    pub right: usize,
    pub wrong: usize,
    pub total: usize,
}

impl Counters {
    pub fn is_consistent(&self) -> bool {
        self.stand + self.right + self.wrong == self.total
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.right as f64 / self.total as f64) * 100.0
        }
    }

    pub(crate) fn open(&mut self) {
        self.total += 1;
        self.stand += 1;
    }

    pub(crate) fn shift(&mut self, from: CaseState, to: CaseState) {
        *self.slot(from) -= 1;
        *self.slot(to) += 1;
    }

    fn slot(&mut self, state: CaseState) -> &mut usize {
        match state {
            CaseState::Stand => &mut self.stand,
            CaseState::Right => &mut self.right,
            CaseState::Wrong => &mut self.wrong,
        }
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "( {} / {} / {} )", self.right, self.wrong, self.total)
    }
}

/// Snapshot of one case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseSummary {
    pub label: String,
    pub state: CaseState,
    pub pending: usize,
    /// First verdict message, later ones appended on new lines
    pub summary: Option<String>,
    pub verdicts: Vec<Verdict>,
}

/// Snapshot of a suite
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub id: usize,
    pub name: String,
    pub counters: Counters,
    pub cases: Vec<CaseSummary>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl SuiteSummary {
    pub fn pass_rate(&self) -> f64 {
        self.counters.pass_rate()
    }

    pub fn is_all_right(&self) -> bool {
        self.counters.right == self.counters.total
    }

    pub fn case(&self, label: &str) -> Option<&CaseSummary> {
        self.cases.iter().find(|c| c.label == label)
    }
}

impl fmt::Display for SuiteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.counters)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for case in &self.cases {
            writeln!(f, "  {} {}", case.state.symbol(), case.label)?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Right: {} | Wrong: {} | Stand: {}",
            self.counters.total, self.counters.right, self.counters.wrong, self.counters.stand
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_label() {
        let verdict = Verdict::pass("(boolean) true").with_name("a");
        assert_eq!(verdict.label(), "a> (boolean) true");
        assert_eq!(Verdict::fail("x").label(), "x");
    }

    #[test]
    fn test_counters_shift_keeps_invariant() {
        let mut counters = Counters::default();
        counters.open();
        counters.open();
        counters.shift(CaseState::Stand, CaseState::Right);
        counters.shift(CaseState::Right, CaseState::Wrong);
        assert!(counters.is_consistent());
        assert_eq!(counters.stand, 1);
        assert_eq!(counters.wrong, 1);
        assert_eq!(counters.to_string(), "( 0 / 1 / 2 )");
    }

    #[test]
    fn test_case_state() {
        assert!(!CaseState::Stand.is_concluded());
        assert!(CaseState::Wrong.is_concluded());
        assert_eq!(CaseState::Right.to_string(), "right");
    }
}
