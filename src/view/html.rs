//! Markup sink: numbered, anchored `<span>` lines.
//!
//! Output is meant for a `<pre>` container. Every line becomes
//! `<span class="line" id="N"><a class="anchor" href="#N">N</a>TEXT</span>`,
//! so `#N` links resolve to it. Consecutive lines are separated by a
//! newline.

use std::borrow::Cow;
use std::io::Write;

use tracing::warn;

use super::sink::{Anchor, LineSink};

/// Escape text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    // Quick check: nothing to escape
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// A [`LineSink`] that writes escaped, anchored markup.
pub struct HtmlSink<W: Write> {
    writer: W,
    /// The last thing written was a line with no newline after it.
    line_open: bool,
    /// Write failures seen so far.
    errors: usize,
}

impl<W: Write> HtmlSink<W> {
    /// Create a sink writing to `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            line_open: false,
            errors: 0,
        }
    }

    /// Number of failed writes.
    pub const fn errors(&self) -> usize {
        self.errors
    }

    /// The underlying writer.
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, markup: &str) {
        if let Err(e) = self.writer.write_all(markup.as_bytes()) {
            self.errors += 1;
            warn!(error = %e, "failed to write markup");
        }
    }
}

impl<W: Write> LineSink for HtmlSink<W> {
    fn append_line(&mut self, number: u64, text: &str) {
        let id = Anchor::for_line(number).id();
        let separator = if self.line_open { "\n" } else { "" };
        let markup = format!(
            r##"{separator}<span class="line" id="{id}"><a class="anchor" href="#{id}">{id}</a>{}</span>"##,
            escape_html(text)
        );
        self.write(&markup);
        self.line_open = true;
    }

    fn append_raw(&mut self, text: &str) {
        let escaped = escape_html(text).into_owned();
        self.write(&escaped);
        if !text.is_empty() {
            self.line_open = !text.ends_with('\n');
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            self.errors += 1;
            warn!(error = %e, "failed to flush markup");
        }
    }
}
