//! Log View: numbered, append-only rendering of one log.
//!
//! [`LogView`] owns the line cursor and hands every line to a [`LineSink`].
//! Sinks shipped here:
//!
//! - [`Scrollback`]: bounded in-memory ring with anchor lookup
//! - [`HtmlSink`]: escaped markup with `id` anchors per line
//!
//! The terminal sink lives in [`crate::terminal`].
//!
//! # Example
//!
//! ```rust
//! use logtail::view::{LogView, Scrollback, Anchor};
//!
//! let mut view = LogView::new("job-1", Scrollback::new(1000));
//! view.seed("cloning\nbuilding\n");
//! view.append("testing\n");
//!
//! assert_eq!(view.rendered_line_count(), 3);
//! let line = view.sink().resolve(Anchor::for_line(2)).unwrap();
//! assert_eq!(line.text, "testing");
//! ```

mod html;
mod log_view;
mod scrollback;
mod sink;

pub use html::{escape_html, HtmlSink};
pub use log_view::LogView;
pub use scrollback::{RenderedLine, Scrollback};
pub use sink::{Anchor, LineSink, Resync};
