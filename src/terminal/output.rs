//! `OutputBuffer`: Single-syscall output buffer for terminal lines.

use crossterm::queue;
use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use std::io::Write;

/// Pre-allocated buffer for building styled terminal output.
///
/// A whole batch of lines is accumulated here, then flushed in a single
/// `write()` syscall.
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    /// Create a new output buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Create a buffer sized for a typical batch (4KB).
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    /// Clear the buffer for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Get the buffer contents.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get the buffer length.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if buffer is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write a string.
    #[inline]
    pub fn write_str(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
    }

    /// Write a line-number gutter: the number right-aligned to `width`
    /// columns, then a separator, in `color`.
    pub fn write_gutter(&mut self, number: u64, width: usize, color: Color) {
        // Writes into a Vec cannot fail.
        let _ = queue!(
            self.data,
            SetForegroundColor(color),
            SetAttribute(Attribute::Dim)
        );
        let _ = write!(self.data, "{number:>width$} │ ");
        let _ = queue!(self.data, SetAttribute(Attribute::Reset), ResetColor);
    }

    /// Flush to a writer in a single syscall and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails. The buffer is
    /// cleared either way.
    pub fn flush_to<W: Write>(&mut self, writer: &mut W) -> std::io::Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        let result = writer.write_all(&self.data).and_then(|()| writer.flush());
        self.data.clear();
        result
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gutter_alignment() {
        let mut out = OutputBuffer::new();
        out.write_gutter(7, 4, Color::DarkGrey);
        let text = String::from_utf8(out.as_bytes().to_vec()).unwrap();
        assert!(text.contains("   7 │ "), "{text:?}");
        assert!(text.starts_with('\x1b'));
    }

    #[test]
    fn test_flush_clears() {
        let mut out = OutputBuffer::new();
        out.write_str("hello\n");
        let mut sink = Vec::new();
        out.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"hello\n");
        assert!(out.is_empty());
    }
}
