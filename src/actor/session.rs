//! Session: one log view fed by one connection.
//!
//! All rendering happens on the thread that pumps the session, one event at
//! a time in the order the connection delivered them.

use super::connection::ConnectionActor;
use super::messages::{ConnectionEvent, StreamEvent};
use crate::config::TailConfig;
use crate::view::{LineSink, LogView, Resync};
use crossbeam_channel::{bounded, never, Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, error, trace};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Connected (or connecting) and rendering chunks.
    Streaming,
    /// No address: the seed is all there is.
    Static,
    /// The stream reported completion and resynchronization was requested.
    Finished,
    /// The connection went away before the stream finished.
    Disconnected,
}

impl SessionStatus {
    /// Whether no more events will be handled.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Streaming)
    }
}

/// A [`LogView`] paired with the connection that feeds it.
pub struct LogSession<S> {
    view: LogView<S>,
    connection: Option<ConnectionActor>,
    events: Receiver<ConnectionEvent>,
    status: SessionStatus,
}

impl<S: LineSink> LogSession<S> {
    /// Start a session for `view`.
    ///
    /// With an address, a connection is opened; without one the session is
    /// static.
    pub fn new(view: LogView<S>, address: Option<&str>, config: &TailConfig) -> Self {
        match address {
            Some(address) => {
                let (tx, rx) = bounded(config.channel_capacity.max(1));
                let connection = ConnectionActor::open(address, tx, config);
                debug!(log = view.id(), address, "session opened");
                Self {
                    view,
                    connection: Some(connection),
                    events: rx,
                    status: SessionStatus::Streaming,
                }
            }
            None => Self {
                view,
                connection: None,
                events: never(),
                status: SessionStatus::Static,
            },
        }
    }

    /// The view.
    pub const fn view(&self) -> &LogView<S> {
        &self.view
    }

    /// The view, mutably.
    pub const fn view_mut(&mut self) -> &mut LogView<S> {
        &mut self.view
    }

    /// Consume the session, closing its connection, and return the view.
    pub fn into_view(mut self) -> LogView<S> {
        self.close();
        self.view
    }

    /// Current status.
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// The connection, if the session streams.
    pub const fn connection(&self) -> Option<&ConnectionActor> {
        self.connection.as_ref()
    }

    /// The channel this session's events arrive on.
    pub const fn events(&self) -> &Receiver<ConnectionEvent> {
        &self.events
    }

    /// Handle one connection event.
    pub fn handle_event(&mut self, event: ConnectionEvent, resync: &mut dyn Resync) -> SessionStatus {
        if self.status.is_terminal() {
            trace!(log = self.view.id(), ?event, "ignoring event on terminal session");
            return self.status;
        }

        match event {
            ConnectionEvent::Opened => {
                debug!(log = self.view.id(), "connected");
            }
            ConnectionEvent::Stream(StreamEvent::Message(chunk)) => {
                self.view.append(&chunk);
            }
            ConnectionEvent::Stream(status @ StreamEvent::Status(_)) => {
                if status.is_finished() {
                    self.view.on_finished(resync);
                    self.close();
                    self.status = SessionStatus::Finished;
                } else {
                    trace!(log = self.view.id(), ?status, "ignoring status");
                }
            }
            ConnectionEvent::Error(e) => {
                error!(log = self.view.id(), error = %e, "stream error");
            }
            ConnectionEvent::Closed => {
                debug!(log = self.view.id(), "stream closed");
                self.view.flush_pending();
                self.status = SessionStatus::Disconnected;
            }
        }
        self.status
    }

    /// Wait up to `timeout` for an event, then handle everything queued.
    ///
    /// Events are handled one at a time, in arrival order, stopping early
    /// once the session becomes terminal.
    pub fn pump(&mut self, timeout: Duration, resync: &mut dyn Resync) -> SessionStatus {
        if self.status.is_terminal() {
            return self.status;
        }

        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event, resync);
            }
            Err(RecvTimeoutError::Timeout) => return self.status,
            Err(RecvTimeoutError::Disconnected) => {
                return self.handle_event(ConnectionEvent::Closed, resync);
            }
        }

        while !self.status.is_terminal() {
            match self.events.try_recv() {
                Ok(event) => {
                    self.handle_event(event, resync);
                }
                Err(_) => break,
            }
        }
        self.status
    }

    /// Pump until the session is terminal.
    pub fn run(&mut self, resync: &mut dyn Resync) -> SessionStatus {
        while !self.status.is_terminal() {
            self.pump(Duration::from_millis(100), resync);
        }
        self.status
    }

    /// Close the connection. Rendered lines stay as they are.
    pub fn close(&mut self) {
        if let Some(connection) = &self.connection {
            connection.close();
        }
    }
}
