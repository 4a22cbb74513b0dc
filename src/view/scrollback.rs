//! Scrollback: ring buffer of rendered lines.
//!
//! An in-memory [`LineSink`] with O(1) append and scroll operations. Lines
//! keep the number the view assigned, so anchors resolve even after old
//! lines have been evicted from the front.

use std::collections::VecDeque;

use super::sink::{Anchor, LineSink};

/// A line as rendered by a [`LogView`](super::LogView).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    /// The line's permanent number.
    pub number: u64,
    /// The raw line text.
    pub text: String,
}

impl RenderedLine {
    /// Create a rendered line.
    pub fn new(number: u64, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// The permalink anchor for this line.
    pub const fn anchor(&self) -> Anchor {
        Anchor::for_line(self.number)
    }
}

/// Ring buffer for storing rendered lines with scrollback.
///
/// Retains at most `max_lines` lines, discarding the oldest when full.
#[derive(Debug)]
pub struct Scrollback {
    /// Lines stored in the buffer, in number order.
    lines: VecDeque<RenderedLine>,
    /// Maximum number of lines to retain.
    max_lines: usize,
    /// Current scroll offset from the bottom (0 = at bottom).
    scroll_offset: usize,
    /// Batch separators received.
    batches: usize,
}

impl Scrollback {
    /// Create a new scrollback with the given capacity.
    pub fn new(max_lines: usize) -> Self {
        let max_lines = max_lines.max(1);
        Self {
            lines: VecDeque::with_capacity(max_lines.min(4096)),
            max_lines,
            scroll_offset: 0,
            batches: 0,
        }
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if nothing has been retained.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of batch separators received.
    pub const fn batches(&self) -> usize {
        self.batches
    }

    /// Iterate over retained lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RenderedLine> {
        self.lines.iter()
    }

    /// The most recent line.
    pub fn last(&self) -> Option<&RenderedLine> {
        self.lines.back()
    }

    /// Get a line by index from the top of the buffer.
    pub fn get(&self, index: usize) -> Option<&RenderedLine> {
        self.lines.get(index)
    }

    /// Find the line an anchor points at, if it is still retained.
    pub fn resolve(&self, anchor: Anchor) -> Option<&RenderedLine> {
        let index = self
            .lines
            .binary_search_by_key(&anchor.line(), |line| line.number)
            .ok()?;
        self.lines.get(index)
    }

    /// Get visible lines for a given viewport height.
    ///
    /// Returns an iterator over lines that should be visible,
    /// accounting for scroll offset.
    pub fn visible_lines(&self, viewport_height: usize) -> impl Iterator<Item = &RenderedLine> {
        let total = self.lines.len();
        let end = total.saturating_sub(self.scroll_offset);
        let start = end.saturating_sub(viewport_height);

        self.lines.range(start..end)
    }

    /// Scroll up by the given number of lines.
    pub fn scroll_up(&mut self, lines: usize) {
        let max_offset = self.lines.len().saturating_sub(1);
        self.scroll_offset = (self.scroll_offset + lines).min(max_offset);
    }

    /// Scroll down by the given number of lines.
    pub const fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// Scroll to the bottom (latest content).
    pub const fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// Check if we're scrolled to the bottom.
    pub const fn at_bottom(&self) -> bool {
        self.scroll_offset == 0
    }

    /// Scroll so that the anchored line is the last visible one.
    ///
    /// Returns `false` if the line is not retained.
    pub fn scroll_to(&mut self, anchor: Anchor) -> bool {
        match self
            .lines
            .binary_search_by_key(&anchor.line(), |line| line.number)
        {
            Ok(index) => {
                self.scroll_offset = self.lines.len() - 1 - index;
                true
            }
            Err(_) => false,
        }
    }
}

impl LineSink for Scrollback {
    fn append_line(&mut self, number: u64, text: &str) {
        while self.lines.len() >= self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(RenderedLine::new(number, text));

        // Keep the viewport pinned when the reader has scrolled away.
        if !self.at_bottom() {
            self.scroll_up(1);
        }
    }

    fn append_raw(&mut self, _text: &str) {
        self.batches += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(count: u64, capacity: usize) -> Scrollback {
        let mut buf = Scrollback::new(capacity);
        for i in 0..count {
            buf.append_line(i, &format!("Line {i}"));
        }
        buf
    }

    #[test]
    fn test_scrollback_new() {
        let buf = Scrollback::new(100);
        assert!(buf.is_empty());
        assert!(buf.last().is_none());
    }

    #[test]
    fn test_scrollback_append() {
        let mut buf = Scrollback::new(100);
        buf.append_line(0, "Hello");
        buf.append_raw("\n");
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.batches(), 1);
        assert_eq!(buf.last(), Some(&RenderedLine::new(0, "Hello")));
    }

    #[test]
    fn test_scrollback_capacity() {
        let buf = filled(4, 3);
        assert_eq!(buf.len(), 3);
        // Line 0 should have been discarded
        assert_eq!(buf.get(0).unwrap().text, "Line 1");
        assert_eq!(buf.get(0).unwrap().number, 1);
    }

    #[test]
    fn test_scrollback_resolve_anchor() {
        let buf = filled(10, 5);
        let line = buf.resolve(Anchor::parse("#7").unwrap()).unwrap();
        assert_eq!(line.text, "Line 7");
        assert_eq!(line.anchor().to_string(), "#7");
        // Evicted.
        assert!(buf.resolve(Anchor::for_line(2)).is_none());
        // Not rendered yet.
        assert!(buf.resolve(Anchor::for_line(10)).is_none());
    }

    #[test]
    fn test_scrollback_scroll() {
        let mut buf = filled(10, 100);
        assert!(buf.at_bottom());

        buf.scroll_up(3);
        assert!(!buf.at_bottom());
        assert_eq!(buf.scroll_offset, 3);

        buf.scroll_down(1);
        assert_eq!(buf.scroll_offset, 2);

        buf.scroll_to_bottom();
        assert!(buf.at_bottom());
    }

    #[test]
    fn test_scrollback_scroll_to_anchor() {
        let mut buf = filled(10, 100);
        assert!(buf.scroll_to(Anchor::for_line(4)));
        let visible: Vec<u64> = buf.visible_lines(3).map(|l| l.number).collect();
        assert_eq!(visible, vec![2, 3, 4]);

        // New lines keep the viewport where it is.
        buf.append_line(10, "Line 10");
        let visible: Vec<u64> = buf.visible_lines(3).map(|l| l.number).collect();
        assert_eq!(visible, vec![2, 3, 4]);

        assert!(!buf.scroll_to(Anchor::for_line(99)));
    }
}
