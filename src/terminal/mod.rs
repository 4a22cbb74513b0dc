//! Terminal output: a [`LineSink`](crate::view::LineSink) for character
//! terminals.

mod output;
mod sink;

pub use output::OutputBuffer;
pub use sink::{clip, sanitize, TerminalConfig, TerminalSink};
