//! Actor Model: Message-passing between the connection and the renderer.
//!
//! Each log stream gets one connection thread; rendering stays on the thread
//! that pumps the session:
//! - **Connection Actor**: Handshake, frame reads, JSON decoding
//! - **Session**: Hands each decoded event to its `LogView`, in order
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ConnectionEvent   ┌──────────────┐
//! │ Connection Thread│ ─────────────────▶  │   Session    │
//! └──────────────────┘   (bounded queue)   │  (LogView)   │
//!          ▲                               └──────────────┘
//!          │ websocket frames                     │
//!  ┌──────────────┐                               │ LineSink
//!  │  Log server  │                               ▼
//!  └──────────────┘                        ┌──────────────┐
//!                                          │ Terminal/HTML│
//!                                          └──────────────┘
//! ```

mod backoff;
mod connection;
mod messages;
mod session;

pub use backoff::ReconnectPolicy;
pub use connection::ConnectionActor;
pub use messages::{ConnectionEvent, ConnectionState, StreamEvent, STATUS_FINISHED};
pub use session::{LogSession, SessionStatus};
