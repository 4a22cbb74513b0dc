//! Sink and resynchronization traits, plus line anchors.
//!
//! A [`LineSink`] is the append-only rendering target a
//! [`LogView`](super::LogView) writes to. The concrete technology (terminal,
//! markup, memory) is up to the host.

use std::fmt;
use std::str::FromStr;

use crate::error::TailError;

/// An append-only rendering target for numbered lines.
///
/// Implementations must never rewrite a line once it has been appended.
pub trait LineSink {
    /// Append one numbered line.
    ///
    /// `text` is raw, untrusted log content. Sinks that produce markup or
    /// drive a terminal must escape or sanitize it.
    fn append_line(&mut self, number: u64, text: &str);

    /// Append presentation-only text that is not a line (batch separators).
    fn append_raw(&mut self, text: &str);

    /// Push buffered output to its destination. Called after every batch.
    fn flush(&mut self) {}
}

impl<S: LineSink + ?Sized> LineSink for &mut S {
    fn append_line(&mut self, number: u64, text: &str) {
        (**self).append_line(number, text);
    }

    fn append_raw(&mut self, text: &str) {
        (**self).append_raw(text);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

impl<S: LineSink + ?Sized> LineSink for Box<S> {
    fn append_line(&mut self, number: u64, text: &str) {
        (**self).append_line(number, text);
    }

    fn append_raw(&mut self, text: &str) {
        (**self).append_raw(text);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// The host operation that re-establishes an authoritative view of a log.
///
/// Called once per log when its stream reports completion. Implementations
/// re-fetch the canonical transcript and replace the incrementally built view.
pub trait Resync {
    /// Resynchronize the view of `log_id`.
    fn resynchronize(&mut self, log_id: &str);
}

impl<F: FnMut(&str)> Resync for F {
    fn resynchronize(&mut self, log_id: &str) {
        self(log_id);
    }
}

/// A permalink fragment addressing one rendered line (`#<number>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Anchor(u64);

impl Anchor {
    /// The anchor for line `number`.
    pub const fn for_line(number: u64) -> Self {
        Self(number)
    }

    /// The line number this anchor points at.
    pub const fn line(self) -> u64 {
        self.0
    }

    /// Parse a fragment such as `#12` (the leading `#` is optional).
    pub fn parse(fragment: &str) -> Option<Self> {
        let digits = fragment.strip_prefix('#').unwrap_or(fragment);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }

    /// The element id a markup sink gives this line.
    pub fn id(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for Anchor {
    type Err = TailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| TailError::Config(format!("not a line anchor: {s:?}")))
    }
}
