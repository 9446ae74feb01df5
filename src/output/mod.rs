//! Output module
//!
//! Render sinks that receive suite progress, and formatters for results.

mod formatter;
mod sink;

pub use formatter::{write_summary_to_file, OutputFormat, ResultFormatter};
pub use sink::{ChannelSink, LogSink, MemorySink, NullSink, RenderEvent, RenderSink, SinkMessage};
