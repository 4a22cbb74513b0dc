//! # Logtail
//!
//! A live log-tail renderer with permalinkable line numbers.
//!
//! Logtail renders the content a log already has, then follows a websocket
//! stream of new content, giving every line a stable number usable as a
//! `#<number>` anchor.
//!
//! ## Core Concepts
//!
//! - **Line numbering**: [`LogView`] owns the cursor; numbers are dense,
//!   strictly increasing and never reassigned
//! - **Actor model**: one connection thread per log, rendering on the caller
//! - **Sinks**: the rendering target is a trait; terminal, markup and
//!   in-memory sinks ship with the crate
//! - **Resynchronization**: a `finished` status hands the log back to the
//!   host to re-fetch its canonical transcript
//!
//! ## Example
//!
//! ```rust,ignore
//! use logtail::{LogRegistry, LogSource, Scrollback, TailConfig};
//!
//! let mut registry = LogRegistry::new(
//!     TailConfig::default(),
//!     |_: &LogSource| Scrollback::new(10_000),
//!     |id: &str| println!("{id} finished"),
//! );
//! registry.discover(LogSource::streaming("job-1", "ws://127.0.0.1:8801/job-1/"))?;
//! registry.run();
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod config;
pub mod error;
pub mod registry;
pub mod terminal;
pub mod view;

// Re-exports for convenience
pub use actor::{ConnectionActor, ConnectionEvent, LogSession, ReconnectPolicy, SessionStatus, StreamEvent};
pub use config::{LineMode, TailConfig};
pub use error::{Result, TailError};
pub use registry::{LogRegistry, LogSource};
pub use terminal::{TerminalConfig, TerminalSink};
pub use view::{Anchor, HtmlSink, LineSink, LogView, Resync, Scrollback};
