//! Timer utilities
//!
//! Suite clocks on the tokio time source, so paused test time applies.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Wall time of one suite run
#[derive(Clone, Copy, Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start counting now
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn started_at(&self) -> Instant {
        self.start
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

/// Split times of the batches of a suite
#[derive(Debug)]
pub struct Stopwatch {
    timer: Timer,
    marks: Vec<(String, Instant)>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            timer: Timer::start(),
            marks: Vec::new(),
        }
    }

    /// Mark the end of a stretch
    pub fn lap(&mut self, label: impl Into<String>) {
        self.marks.push((label.into(), Instant::now()));
    }

    pub fn total(&self) -> Duration {
        self.timer.elapsed()
    }

    /// Length of each stretch, in marking order
    pub fn splits(&self) -> Vec<(&str, Duration)> {
        let mut previous = self.timer.started_at();
        self.marks
            .iter()
            .map(|(label, at)| {
                let split = at.duration_since(previous);
                previous = *at;
                (label.as_str(), split)
            })
            .collect()
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, split) in self.splits() {
            writeln!(f, "  {label}: {}ms", split.as_millis())?;
        }
        write!(f, "  total: {}ms", self.total().as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_timer() {
        let timer = Timer::start();
        advance(Duration::from_millis(10)).await;
        assert_eq!(timer.elapsed_ms(), 10);
        assert_eq!(timer.elapsed(), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopwatch_splits() {
        let mut sw = Stopwatch::new();
        advance(Duration::from_millis(10)).await;
        sw.lap("batch 1");
        advance(Duration::from_millis(30)).await;
        sw.lap("batch 2");

        assert_eq!(
            sw.splits(),
            vec![
                ("batch 1", Duration::from_millis(10)),
                ("batch 2", Duration::from_millis(30))
            ]
        );
        assert_eq!(sw.to_string(), "  batch 1: 10ms\n  batch 2: 30ms\n  total: 40ms");
    }
}
