//! Terminal sink: numbered lines on a character terminal.
//!
//! Log text is untrusted. Escape sequences are stripped and other control
//! characters replaced before anything reaches the terminal.

use super::output::OutputBuffer;
use crate::view::LineSink;
use crossterm::style::Color;
use std::io::Write;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Columns between the gutter number and the text (`" │ "`).
const GUTTER_SEPARATOR_WIDTH: usize = 3;

/// Configuration for the terminal sink.
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// Minimum width of the line-number column.
    pub gutter_width: usize,
    /// Gutter color.
    pub gutter_color: Color,
    /// Clip lines (gutter included) to this many columns.
    pub max_width: Option<usize>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            gutter_width: 6,
            gutter_color: Color::DarkGrey,
            max_width: None,
        }
    }
}

/// A [`LineSink`] that writes numbered lines to a terminal.
///
/// Output is buffered and written once per batch, when the view flushes.
pub struct TerminalSink<W: Write> {
    writer: W,
    output: OutputBuffer,
    config: TerminalConfig,
    /// Write failures seen so far.
    errors: usize,
}

impl<W: Write> TerminalSink<W> {
    /// Create a sink with the default configuration.
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, TerminalConfig::default())
    }

    /// Create a sink with a custom configuration.
    pub fn with_config(writer: W, config: TerminalConfig) -> Self {
        Self {
            writer,
            output: OutputBuffer::new(),
            config,
            errors: 0,
        }
    }

    /// Number of failed flushes.
    pub const fn errors(&self) -> usize {
        self.errors
    }

    /// The underlying writer.
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Columns left for text on each line.
    fn text_width(&self, number: u64) -> Option<usize> {
        let digits = number.checked_ilog10().map_or(1, |d| d as usize + 1);
        let gutter = digits.max(self.config.gutter_width) + GUTTER_SEPARATOR_WIDTH;
        self.config.max_width.map(|max| max.saturating_sub(gutter))
    }
}

/// Remove escape sequences and replace control characters.
///
/// CSI sequences (`ESC [ ... final`) are dropped whole, other escapes drop
/// the `ESC` and the byte after it. Tabs are kept.
pub fn sanitize(text: &str) -> String {
    let mut clean = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.next() {
                Some('[') => {
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(_) | None => {}
            },
            '\t' => clean.push(c),
            c if c.is_control() => clean.push('\u{fffd}'),
            c => clean.push(c),
        }
    }
    clean
}

/// Clip `text` to `width` display columns, marking the cut with `…`.
pub fn clip(text: &str, width: usize) -> &str {
    if UnicodeWidthStr::width(text) <= width {
        return text;
    }
    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut end = 0;
    for (index, grapheme) in text.grapheme_indices(true) {
        let w = UnicodeWidthStr::width(grapheme);
        if used + w > budget {
            break;
        }
        used += w;
        end = index + grapheme.len();
    }
    &text[..end]
}

impl<W: Write> LineSink for TerminalSink<W> {
    fn append_line(&mut self, number: u64, text: &str) {
        let text = sanitize(text);
        let width = self.text_width(number);
        self.output
            .write_gutter(number, self.config.gutter_width, self.config.gutter_color);
        match width {
            Some(width) if UnicodeWidthStr::width(text.as_str()) > width => {
                self.output.write_str(clip(&text, width));
                if width > 0 {
                    self.output.write_str("…");
                }
            }
            _ => self.output.write_str(&text),
        }
        self.output.write_str("\n");
    }

    fn append_raw(&mut self, text: &str) {
        // Every line already ends the row; only visible separators print.
        if text.trim().is_empty() {
            return;
        }
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.output.write_str("\n");
            }
            self.output.write_str(&sanitize(part));
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.output.flush_to(&mut self.writer) {
            self.errors += 1;
            warn!(error = %e, "failed to write to terminal");
        }
    }
}

impl<W: Write> Drop for TerminalSink<W> {
    fn drop(&mut self) {
        LineSink::flush(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::LogView;

    /// Output with the gutter styling sequences removed.
    fn plain(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes)
            .lines()
            .map(|line| sanitize(line) + "\n")
            .collect()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(sanitize("a\tb"), "a\tb");
        assert_eq!(sanitize("bell\x07"), "bell\u{fffd}");
        assert_eq!(sanitize("\x1b"), "");
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("hello", 10), "hello");
        assert_eq!(clip("hello world", 6), "hello");
        assert_eq!(clip("日本語テキスト", 5), "日本");
    }

    #[test]
    fn test_lines_are_numbered_and_flushed_per_batch() {
        let mut out = Vec::new();
        {
            let config = TerminalConfig {
                gutter_width: 2,
                ..TerminalConfig::default()
            };
            let mut view = LogView::new("job", TerminalSink::with_config(&mut out, config));
            view.seed("one\n");
            view.append("two\nthree\n");
        }
        assert_eq!(plain(&out), " 0 │ one\n 1 │ two\n 2 │ three\n");
    }

    #[test]
    fn test_long_lines_are_clipped() {
        let mut out = Vec::new();
        {
            let config = TerminalConfig {
                gutter_width: 1,
                max_width: Some(10),
                ..TerminalConfig::default()
            };
            let mut sink = TerminalSink::with_config(&mut out, config);
            sink.append_line(0, "abcdefghijkl");
            sink.flush();
        }
        // 1 digit + separator leaves 6 columns: 5 characters and the marker.
        assert_eq!(plain(&out), "0 │ abcde…\n");
    }

    #[test]
    fn test_separators() {
        let mut out = Vec::new();
        {
            let mut sink = TerminalSink::new(&mut out);
            sink.append_raw("\n");
            sink.append_raw("-- done --\n");
            sink.append_raw("\x1b[2Jwiped");
            sink.flush();
        }
        assert_eq!(String::from_utf8_lossy(&out), "-- done --\nwiped");
    }
}
