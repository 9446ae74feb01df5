//! Render sinks
//!
//! The only channel through which suite progress leaves the engine. Display
//! layers implement [`RenderSink`]; the engine never depends on how events
//! are shown.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::formatter::{OutputFormat, ResultFormatter};
use crate::models::{CaseState, Counters, SuiteSummary};

/// One settled verdict, as seen by a display layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderEvent {
    pub suite_id: usize,
    pub suite_name: String,
    pub case_label: String,
    pub message: String,
    pub passed: bool,
    /// Case state after this verdict
    pub state: CaseState,
    /// Suite counters after this verdict
    pub counters: Counters,
}

/// Receives suite progress.
///
/// Calls are made outside the engine's locks, in settlement order.
pub trait RenderSink: Send + Sync {
    fn suite_started(&self, _suite_id: usize, _name: &str) {}

    fn case_started(&self, _suite_id: usize, _label: &str) {}

    fn verdict(&self, event: &RenderEvent);

    fn suite_completed(&self, _summary: &SuiteSummary) {}
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn verdict(&self, _event: &RenderEvent) {}
}

/// Writes progress to the tracing subscriber
#[derive(Debug)]
pub struct LogSink {
    formatter: ResultFormatter,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            formatter: ResultFormatter::new(OutputFormat::Summary).no_color(),
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for LogSink {
    fn suite_started(&self, suite_id: usize, name: &str) {
        info!("Suite #{} {} started", suite_id, name);
    }

    fn verdict(&self, event: &RenderEvent) {
        let line = self.formatter.format_event(event);
        if event.passed {
            info!("{}", line);
        } else {
            warn!("{}", line);
        }
    }

    fn suite_completed(&self, summary: &SuiteSummary) {
        info!("{}", self.formatter.format_summary(summary));
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RenderEvent>>,
    cases: Mutex<Vec<(usize, String)>>,
    summaries: Mutex<Vec<SuiteSummary>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(suite_id, label)` of every case started
    pub fn cases(&self) -> Vec<(usize, String)> {
        self.cases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summaries(&self) -> Vec<SuiteSummary> {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }
}

impl RenderSink for MemorySink {
    fn case_started(&self, suite_id: usize, label: &str) {
        self.cases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((suite_id, label.to_string()));
    }

    fn verdict(&self, event: &RenderEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    fn suite_completed(&self, summary: &SuiteSummary) {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary.clone());
    }
}

/// Messages forwarded by [`ChannelSink`]
#[derive(Clone, Debug)]
pub enum SinkMessage {
    SuiteStarted { suite_id: usize, name: String },
    CaseStarted { suite_id: usize, label: String },
    Verdict(RenderEvent),
    SuiteCompleted(Box<SuiteSummary>),
}

/// Forwards progress over an unbounded tokio channel
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, message: SinkMessage) {
        // receiver gone means nobody is watching
        let _ = self.tx.send(message);
    }
}

impl RenderSink for ChannelSink {
    fn suite_started(&self, suite_id: usize, name: &str) {
        self.send(SinkMessage::SuiteStarted {
            suite_id,
            name: name.to_string(),
        });
    }

    fn case_started(&self, suite_id: usize, label: &str) {
        self.send(SinkMessage::CaseStarted {
            suite_id,
            label: label.to_string(),
        });
    }

    fn verdict(&self, event: &RenderEvent) {
        self.send(SinkMessage::Verdict(event.clone()));
    }

    fn suite_completed(&self, summary: &SuiteSummary) {
        self.send(SinkMessage::SuiteCompleted(Box::new(summary.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(passed: bool) -> RenderEvent {
        RenderEvent {
            suite_id: 1,
            suite_name: "Test 1".to_string(),
            case_label: "t1".to_string(),
            message: "(boolean) true".to_string(),
            passed,
            state: if passed {
                CaseState::Right
            } else {
                CaseState::Wrong
            },
            counters: Counters {
                stand: 0,
                right: usize::from(passed),
                wrong: usize::from(!passed),
                total: 1,
            },
        }
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.case_started(1, "t1");
        sink.verdict(&event(true));
        sink.verdict(&event(false));
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.cases(), vec![(1, "t1".to_string())]);
        assert_eq!(sink.messages()[0], "(boolean) true");
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.suite_started(1, "Test 1");
        sink.verdict(&event(true));
        assert!(matches!(
            rx.recv().await,
            Some(SinkMessage::SuiteStarted { suite_id: 1, .. })
        ));
        match rx.recv().await {
            Some(SinkMessage::Verdict(e)) => assert!(e.passed),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_channel_sink_without_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.verdict(&event(false));
    }

    #[test]
    fn test_log_sink_does_not_panic() {
        let sink = LogSink::new();
        sink.suite_started(1, "Test 1");
        sink.verdict(&event(true));
        sink.verdict(&event(false));
    }
}
