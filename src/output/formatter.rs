//! Output formatters for suite results
//!
//! Provides JSON, CSV, table and summary output formats.

use anyhow::Context;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::sink::RenderEvent;
use crate::models::{CaseState, SuiteSummary};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => OutputFormat::JsonPretty,
            Some("csv") => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

#[derive(Serialize)]
struct CaseRow<'a> {
    suite: &'a str,
    case: &'a str,
    state: CaseState,
    pending: usize,
    verdicts: usize,
    summary: &'a str,
}

/// Result formatter
#[derive(Clone, Debug)]
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn paint(&self, text: &str, state: CaseState) -> String {
        if !self.colorize {
            return text.to_string();
        }
        let color = match state {
            CaseState::Right => "32",
            CaseState::Wrong => "31",
            CaseState::Stand => "33",
        };
        format!("\x1b[{color}m{text}\x1b[0m")
    }

    /// Format a single settled verdict
    pub fn format_event(&self, event: &RenderEvent) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(event).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(event).unwrap_or_default(),
            OutputFormat::Csv => self.format_event_csv(event),
            OutputFormat::Table | OutputFormat::Summary => self.format_event_line(event),
        }
    }

    fn format_event_line(&self, event: &RenderEvent) -> String {
        let (symbol, state) = if event.passed {
            ("✓", CaseState::Right)
        } else {
            ("✗", CaseState::Wrong)
        };
        format!(
            "{} {} {}: {} {}",
            self.paint(symbol, state),
            event.suite_name,
            event.case_label,
            event.message.replace('\n', " "),
            event.counters
        )
    }

    fn format_event_csv(&self, event: &RenderEvent) -> String {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        let record = [
            event.suite_id.to_string(),
            event.suite_name.clone(),
            event.case_label.clone(),
            event.passed.to_string(),
            event.message.clone(),
        ];
        if writer.write_record(&record).is_err() {
            return String::new();
        }
        writer
            .into_inner()
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default()
    }

    /// Format a suite summary
    pub fn format_summary(&self, summary: &SuiteSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Csv => self.format_summary_csv(summary).unwrap_or_default(),
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_table(&self, summary: &SuiteSummary) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!("║  Suite {:3} - {:46} ║\n", summary.id, summary.name));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for case in &summary.cases {
            let state = self.paint(case.state.symbol(), case.state);
            output.push_str(&format!("║  {} {:57} ║\n", state, case.label));
            if let Some(text) = &case.summary {
                for line in text.lines() {
                    output.push_str(&format!("║      {:56} ║\n", line));
                }
            }
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║  Total: {:3} | Right: {:3} | Wrong: {:3} | Stand: {:3}          ║\n",
            summary.counters.total,
            summary.counters.right,
            summary.counters.wrong,
            summary.counters.stand
        ));
        output.push_str(&format!(
            "║  Pass Rate: {:5.1}% | Duration: {:6}ms                      ║\n",
            summary.pass_rate(),
            summary.duration_ms
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_summary_csv(&self, summary: &SuiteSummary) -> anyhow::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for case in &summary.cases {
            writer.serialize(CaseRow {
                suite: &summary.name,
                case: &case.label,
                state: case.state,
                pending: case.pending,
                verdicts: case.verdicts.len(),
                summary: case.summary.as_deref().unwrap_or(""),
            })?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
        Ok(String::from_utf8(bytes)?)
    }

    fn format_summary_brief(&self, summary: &SuiteSummary) -> String {
        format!(
            "{} {}: {}/{} right, {} wrong ({:.1}%) in {}ms",
            summary.name,
            summary.counters,
            summary.counters.right,
            summary.counters.total,
            summary.counters.wrong,
            summary.pass_rate(),
            summary.duration_ms
        )
    }

    /// Format several suites side by side
    pub fn format_overview(&self, summaries: &[SuiteSummary]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(summaries).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summaries).unwrap_or_default(),
            _ => self.format_overview_table(summaries),
        }
    }

    fn format_overview_table(&self, summaries: &[SuiteSummary]) -> String {
        let mut output = String::new();

        output.push_str(
            "\n┌─────────────────────────┬───────┬───────┬───────┬──────────┬───────────────┐\n",
        );
        output.push_str(
            "│ Suite                   │ Right │ Wrong │ Total │ Rate     │ Duration      │\n",
        );
        output.push_str(
            "├─────────────────────────┼───────┼───────┼───────┼──────────┼───────────────┤\n",
        );

        for summary in summaries {
            let rate_str = format!("{:5.1}%", summary.pass_rate());
            let state = if summary.counters.wrong > 0 {
                CaseState::Wrong
            } else if summary.is_all_right() {
                CaseState::Right
            } else {
                CaseState::Stand
            };

            output.push_str(&format!(
                "│ {:23} │ {:5} │ {:5} │ {:5} │ {:>8} │ {:>11}ms │\n",
                summary.name,
                summary.counters.right,
                summary.counters.wrong,
                summary.counters.total,
                self.paint(&rate_str, state),
                summary.duration_ms
            ));
        }

        output.push_str(
            "└─────────────────────────┴───────┴───────┴───────┴──────────┴───────────────┘\n",
        );

        output
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Write a suite summary to a file, picking the format from its extension
pub fn write_summary_to_file(path: impl AsRef<Path>, summary: &SuiteSummary) -> anyhow::Result<()> {
    let path = path.as_ref();
    let formatter = ResultFormatter::new(OutputFormat::from_path(path)).no_color();
    let content = formatter.format_summary(summary);

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseSummary, Counters, Verdict};
    use chrono::Utc;

    fn summary() -> SuiteSummary {
        SuiteSummary {
            id: 1,
            name: "Test 1".to_string(),
            counters: Counters {
                stand: 0,
                right: 1,
                wrong: 1,
                total: 2,
            },
            cases: vec![
                CaseSummary {
                    label: "t1".to_string(),
                    state: CaseState::Right,
                    pending: 0,
                    summary: Some("(boolean) true".to_string()),
                    verdicts: vec![Verdict::pass("(boolean) true")],
                },
                CaseSummary {
                    label: "t2".to_string(),
                    state: CaseState::Wrong,
                    pending: 0,
                    summary: Some("(number) 1 === (string) '1'".to_string()),
                    verdicts: vec![Verdict::fail("(number) 1 === (string) '1'")],
                },
            ],
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            duration_ms: 12,
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("unknown"), None);
        assert_eq!(
            OutputFormat::from_path(Path::new("out.csv")),
            OutputFormat::Csv
        );
    }

    #[test]
    fn test_formatter_creation() {
        let formatter = ResultFormatter::new(OutputFormat::Json).no_color();
        assert_eq!(formatter.format, OutputFormat::Json);
        assert!(!formatter.colorize);
    }

    #[test]
    fn test_format_summary_brief() {
        let formatter = ResultFormatter::new(OutputFormat::Summary);
        let output = formatter.format_summary(&summary());
        assert_eq!(output, "Test 1 ( 1 / 1 / 2 ): 1/2 right, 1 wrong (50.0%) in 12ms");
    }

    #[test]
    fn test_format_summary_csv() {
        let formatter = ResultFormatter::new(OutputFormat::Csv);
        let output = formatter.format_summary(&summary());
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("suite,case,state,pending,verdicts,summary")
        );
        assert_eq!(lines.next(), Some("Test 1,t1,right,0,1,(boolean) true"));
        assert_eq!(
            lines.next(),
            Some("Test 1,t2,wrong,0,1,(number) 1 === (string) '1'")
        );
    }

    #[test]
    fn test_format_summary_json() {
        let formatter = ResultFormatter::new(OutputFormat::Json);
        let output = formatter.format_summary(&summary());
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["counters"]["right"], 1);
        assert_eq!(parsed["cases"][1]["state"], "wrong");
    }

    #[test]
    fn test_format_event_csv_quotes() {
        let event = RenderEvent {
            suite_id: 1,
            suite_name: "Test 1".to_string(),
            case_label: "t1".to_string(),
            message: "a, b".to_string(),
            passed: false,
            state: CaseState::Wrong,
            counters: Counters::default(),
        };
        let formatter = ResultFormatter::new(OutputFormat::Csv);
        assert_eq!(formatter.format_event(&event), "1,Test 1,t1,false,\"a, b\"");
    }

    #[test]
    fn test_format_table_and_overview() {
        let formatter = ResultFormatter::default().no_color();
        let table = formatter.format_summary(&summary());
        assert!(table.contains("✗ t2"));
        let overview = formatter.format_overview(&[summary()]);
        assert!(overview.contains("Test 1"));
    }

    #[test]
    fn test_write_summary_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_summary_to_file(&path, &summary()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"name\": \"Test 1\""));
    }
}
