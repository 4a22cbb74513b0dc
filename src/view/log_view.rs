//! `LogView`: the line-numbering engine.
//!
//! Owns the running line cursor and the sink for one log. Text enters either
//! as the seed (content that existed before streaming began) or as streamed
//! chunks, and leaves as numbered lines in strict arrival order.

use super::sink::{LineSink, Resync};
use crate::config::LineMode;
use tracing::{debug, info, warn};

/// Separator emitted after every streamed batch. Not a line.
const BATCH_SEPARATOR: &str = "\n";

/// Strip the trailing newline run and split the remainder into lines.
///
/// A `\r` directly before a newline belongs to the line ending. Input made
/// only of newlines yields a single empty line.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.trim_end_matches(['\n', '\r'])
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Split newline-terminated text into lines, one per terminator.
fn split_terminated(text: &str) -> impl Iterator<Item = &str> {
    text.strip_suffix('\n')
        .unwrap_or(text)
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// The rendering target for one log instance.
pub struct LogView<S> {
    /// Log instance identifier, handed to the resync hook.
    id: String,
    /// Number of lines rendered so far; also the next line's number.
    cursor: u64,
    /// Rendering target.
    sink: S,
    /// Line splitting behavior.
    mode: LineMode,
    /// Trailing partial line held back in [`LineMode::Buffered`].
    pending: String,
    /// Whether `seed` has been called.
    seeded: bool,
    /// Whether content has been appended.
    streamed: bool,
    /// Terminal state after `on_finished`.
    finished: bool,
}

impl<S: LineSink> LogView<S> {
    /// Create an empty view.
    pub fn new(id: impl Into<String>, sink: S) -> Self {
        Self::with_mode(id, sink, LineMode::default())
    }

    /// Create an empty view with an explicit line mode.
    pub fn with_mode(id: impl Into<String>, sink: S, mode: LineMode) -> Self {
        Self {
            id: id.into(),
            cursor: 0,
            sink,
            mode,
            pending: String::new(),
            seeded: false,
            streamed: false,
            finished: false,
        }
    }

    /// Render the content that existed before streaming began.
    ///
    /// Valid once, before any [`append`](Self::append). Empty text renders
    /// nothing and consumes no line number. Returns the number of lines
    /// rendered.
    pub fn seed(&mut self, initial_text: &str) -> usize {
        if self.seeded || self.streamed || self.finished {
            warn!(log = %self.id, "ignoring seed: view already has content or is finished");
            return 0;
        }
        self.seeded = true;
        if initial_text.is_empty() {
            return 0;
        }
        let rendered = self.render(initial_text);
        self.sink.flush();
        rendered
    }

    /// Render one streamed chunk.
    ///
    /// Empty chunks are dropped. Otherwise the chunk's lines are numbered
    /// from the cursor and a batch separator follows them. Returns the number
    /// of lines rendered.
    pub fn append(&mut self, chunk: &str) -> usize {
        if chunk.is_empty() {
            return 0;
        }
        if self.finished {
            debug!(log = %self.id, "ignoring chunk after finish");
            return 0;
        }
        self.streamed = true;

        let rendered = match self.mode {
            LineMode::PerChunk => self.render(chunk),
            LineMode::Buffered => self.render_buffered(chunk),
        };
        if rendered > 0 {
            self.sink.append_raw(BATCH_SEPARATOR);
            self.sink.flush();
        }
        rendered
    }

    /// Render text held back in [`LineMode::Buffered`] as a final line.
    ///
    /// Called when the stream ends. Returns the number of lines rendered.
    pub fn flush_pending(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let pending = std::mem::take(&mut self.pending);
        let rendered = self.render(&pending);
        self.sink.append_raw(BATCH_SEPARATOR);
        self.sink.flush();
        rendered
    }

    /// Handle the end-of-stream signal.
    ///
    /// Flushes held-back text, makes the view terminal and asks the host to
    /// resynchronize. Only the first call has an effect; the return value
    /// tells whether this call was it.
    pub fn on_finished(&mut self, resync: &mut dyn Resync) -> bool {
        if self.finished {
            return false;
        }
        self.flush_pending();
        self.finished = true;
        info!(log = %self.id, lines = self.cursor, "log finished, resynchronizing");
        resync.resynchronize(&self.id);
        true
    }

    /// Log instance identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of lines rendered so far.
    pub const fn rendered_line_count(&self) -> u64 {
        self.cursor
    }

    /// Whether the view reached its terminal state.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// The configured line mode.
    pub const fn line_mode(&self) -> LineMode {
        self.mode
    }

    /// Text currently held back in [`LineMode::Buffered`].
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// The sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// The sink, mutably. Hosts use this for presentation (scrolling);
    /// rendered lines must not be rewritten through it.
    pub const fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the view and return its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Number and hand every line of `text` to the sink.
    fn render(&mut self, text: &str) -> usize {
        self.render_lines(split_lines(text))
    }

    fn render_lines<'a>(&mut self, lines: impl Iterator<Item = &'a str>) -> usize {
        let mut rendered = 0;
        for line in lines {
            self.sink.append_line(self.cursor, line);
            self.cursor += 1;
            rendered += 1;
        }
        rendered
    }

    /// Render complete lines of `pending + chunk`, keeping the remainder.
    fn render_buffered(&mut self, chunk: &str) -> usize {
        self.pending.push_str(chunk);
        let Some(last_newline) = self.pending.rfind('\n') else {
            return 0;
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        self.render_lines(split_terminated(&complete))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records everything the view hands to its sink.
    #[derive(Debug, Default)]
    struct Recorder {
        lines: Vec<(u64, String)>,
        raw: Vec<String>,
    }

    impl LineSink for Recorder {
        fn append_line(&mut self, number: u64, text: &str) {
            self.lines.push((number, text.to_string()));
        }

        fn append_raw(&mut self, text: &str) {
            self.raw.push(text.to_string());
        }
    }

    fn view() -> LogView<Recorder> {
        LogView::new("job", Recorder::default())
    }

    fn numbers(view: &LogView<Recorder>) -> Vec<u64> {
        view.sink().lines.iter().map(|(n, _)| *n).collect()
    }

    fn texts(view: &LogView<Recorder>) -> Vec<&str> {
        view.sink().lines.iter().map(|(_, t)| t.as_str()).collect()
    }

    #[test]
    fn test_seed_strips_trailing_newlines() {
        let mut view = view();
        assert_eq!(view.seed("a\nb\n"), 2);
        assert_eq!(numbers(&view), vec![0, 1]);
        assert_eq!(texts(&view), vec!["a", "b"]);
        assert_eq!(view.rendered_line_count(), 2);
        // The seed is not a streamed batch.
        assert!(view.sink().raw.is_empty());
    }

    #[test]
    fn test_seed_empty_is_noop() {
        let mut view = view();
        assert_eq!(view.seed(""), 0);
        assert_eq!(view.rendered_line_count(), 0);
        assert!(view.sink().lines.is_empty());
        assert!(view.sink().raw.is_empty());
    }

    #[test]
    fn test_seed_only_once_and_before_streaming() {
        let mut view = view();
        view.seed("a\n");
        assert_eq!(view.seed("b\n"), 0);

        let mut streamed = LogView::new("job", Recorder::default());
        streamed.append("x\n");
        assert_eq!(streamed.seed("y\n"), 0);
        assert_eq!(texts(&streamed), vec!["x"]);
    }

    #[test]
    fn test_append_empty_is_noop() {
        let mut view = view();
        view.seed("a\n");
        assert_eq!(view.append(""), 0);
        assert_eq!(view.rendered_line_count(), 1);
        assert_eq!(view.sink().lines.len(), 1);
        assert!(view.sink().raw.is_empty());
    }

    #[test]
    fn test_append_continues_numbering() {
        let mut view = view();
        view.seed("s0\ns1");
        view.append("c0\nc1\n\n");
        view.append("c2");
        assert_eq!(numbers(&view), vec![0, 1, 2, 3, 4]);
        assert_eq!(texts(&view), vec!["s0", "s1", "c0", "c1", "c2"]);
        assert_eq!(view.sink().raw, vec!["\n", "\n"]);
    }

    #[test]
    fn test_numbers_are_dense_across_many_chunks() {
        let mut view = view();
        let chunks = ["a\n", "b\nc\n", "\n", "d", "e\r\nf\r\n", "g\n\nh\n"];
        let mut expected = 0;
        for chunk in chunks {
            expected += view.append(chunk);
        }
        let expected = u64::try_from(expected).unwrap();
        assert_eq!(view.rendered_line_count(), expected);
        assert_eq!(numbers(&view), (0..expected).collect::<Vec<_>>());
    }

    #[test]
    fn test_newline_only_chunk_renders_one_empty_line() {
        let mut view = view();
        assert_eq!(view.append("\n\n"), 1);
        assert_eq!(texts(&view), vec![""]);
    }

    #[test]
    fn test_interior_empty_lines_are_kept() {
        let mut view = view();
        view.append("a\n\nb\n");
        assert_eq!(texts(&view), vec!["a", "", "b"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut view = view();
        view.append("a\r\nb\r\n");
        assert_eq!(texts(&view), vec!["a", "b"]);
    }

    #[test]
    fn test_line_aligned_fragmentation_is_stable() {
        let mut whole = view();
        whole.append("hello\nworld\n");

        let mut split = view();
        split.append("hello\n");
        split.append("world\n");

        assert_eq!(whole.sink().lines, split.sink().lines);
        assert_eq!(split.rendered_line_count(), 2);
    }

    #[test]
    fn test_mid_line_fragmentation_diverges_per_chunk() {
        // Each chunk is split on its own, so the fragmented first line
        // renders as two lines.
        let mut split = view();
        split.append("hel");
        split.append("lo\nworld\n");

        assert_eq!(split.rendered_line_count(), 3);
        assert_eq!(texts(&split), vec!["hel", "lo", "world"]);
    }

    #[test]
    fn test_mid_line_fragmentation_buffered() {
        let mut split = LogView::with_mode("job", Recorder::default(), LineMode::Buffered);
        assert_eq!(split.append("hel"), 0);
        assert_eq!(split.pending(), "hel");
        assert_eq!(split.append("lo\nworld\n"), 2);

        assert_eq!(texts(&split), vec!["hello", "world"]);
        assert_eq!(numbers(&split), vec![0, 1]);
        assert_eq!(split.pending(), "");
    }

    #[test]
    fn test_buffered_keeps_trailing_empty_lines() {
        let mut view = LogView::with_mode("job", Recorder::default(), LineMode::Buffered);
        view.append("a\n\n");
        view.append("b\r\n");
        assert_eq!(texts(&view), vec!["a", "", "b"]);
    }

    #[test]
    fn test_buffered_flushes_on_finish() {
        let mut view = LogView::with_mode("job", Recorder::default(), LineMode::Buffered);
        view.append("a\nparti");
        view.append("al");
        assert_eq!(texts(&view), vec!["a"]);

        let mut calls = 0;
        view.on_finished(&mut |_: &str| calls += 1);
        assert_eq!(texts(&view), vec!["a", "partial"]);
        assert_eq!(numbers(&view), vec![0, 1]);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_finished_is_terminal_and_fires_once() {
        let mut view = view();
        view.seed("line0\nline1\n");
        view.append("line2\n");
        view.append("");

        let mut calls = Vec::new();
        let mut hook = |id: &str| calls.push(id.to_string());
        assert!(view.on_finished(&mut hook));
        assert!(!view.on_finished(&mut hook));
        assert_eq!(view.append("late\n"), 0);
        assert_eq!(view.seed("late\n"), 0);

        assert!(view.is_finished());
        assert_eq!(view.rendered_line_count(), 3);
        assert_eq!(numbers(&view), vec![0, 1, 2]);
        assert_eq!(calls, vec!["job".to_string()]);
    }
}
