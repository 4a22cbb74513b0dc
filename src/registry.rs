//! Registry: every log instance the host knows about.
//!
//! Each discovered [`LogSource`] gets its own sink, [`LogView`] and
//! connection. Nothing mutable is shared between instances; the registry
//! only owns the host-side hooks (sink factory, resynchronization) and the
//! reconnection schedule.

use crate::actor::{ConnectionEvent, LogSession, SessionStatus};
use crate::config::TailConfig;
use crate::error::{Result, TailError};
use crate::view::{LineSink, LogView, Resync};
use crossbeam_channel::{Select, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A log instance discovered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    /// Unique identifier (a job id, a file name, ...).
    pub id: String,
    /// Streaming address. `None` means the log is static.
    pub address: Option<String>,
    /// Content already present before streaming.
    pub seed: String,
}

impl LogSource {
    /// A log that streams from `address`.
    pub fn streaming(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: Some(address.into()),
            seed: String::new(),
        }
    }

    /// A static log made of `seed` only.
    pub fn fixed(id: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: None,
            seed: seed.into(),
        }
    }

    /// Set the seed text.
    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }
}

/// One registered log.
struct Entry<S> {
    source: LogSource,
    session: LogSession<S>,
    /// Reconnection attempts since the last successful open.
    attempts: u32,
    /// When the next reconnection is due.
    reconnect_at: Option<Instant>,
    /// Closed by `teardown`; never pumped or reconnected again.
    torn_down: bool,
}

/// Host-level owner of all log sessions.
pub struct LogRegistry<S, F, R> {
    config: TailConfig,
    make_sink: F,
    resync: R,
    entries: Vec<Entry<S>>,
}

impl<S, F, R> LogRegistry<S, F, R>
where
    S: LineSink,
    F: FnMut(&LogSource) -> S,
    R: Resync,
{
    /// Create an empty registry.
    ///
    /// `make_sink` builds a fresh sink for every view; `resync` is invoked
    /// once per log whose stream finishes.
    pub const fn new(config: TailConfig, make_sink: F, resync: R) -> Self {
        Self {
            config,
            make_sink,
            resync,
            entries: Vec::new(),
        }
    }

    /// Register a log instance: build its view, seed it and connect.
    pub fn discover(&mut self, source: LogSource) -> Result<()> {
        if self.entries.iter().any(|e| e.source.id == source.id) {
            return Err(TailError::Config(format!("duplicate log id `{}`", source.id)));
        }
        let session = self.build_session(&source);
        debug!(log = %source.id, streaming = source.address.is_some(), "log discovered");
        self.entries.push(Entry {
            source,
            session,
            attempts: 0,
            reconnect_at: None,
            torn_down: false,
        });
        Ok(())
    }

    /// Number of registered logs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no logs are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of logs still streaming or waiting to reconnect.
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| Self::is_active(e)).count()
    }

    /// The session of log `id`.
    pub fn get(&self, id: &str) -> Option<&LogSession<S>> {
        self.entries.iter().find(|e| e.source.id == id).map(|e| &e.session)
    }

    /// The session of log `id`, mutably.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut LogSession<S>> {
        self.entries
            .iter_mut()
            .find(|e| e.source.id == id)
            .map(|e| &mut e.session)
    }

    /// The resynchronization hook.
    pub const fn resync(&self) -> &R {
        &self.resync
    }

    /// Wait up to `timeout` for events on any live session and handle them.
    ///
    /// Returns the number of events handled. Due reconnections are
    /// performed first.
    pub fn pump(&mut self, timeout: Duration) -> usize {
        self.reconnect_due();

        let live: Vec<usize> = (0..self.entries.len())
            .filter(|&i| {
                let entry = &self.entries[i];
                !entry.torn_down && !entry.session.status().is_terminal()
            })
            .collect();
        if live.is_empty() {
            let wait = self.next_reconnect().map_or(Duration::ZERO, |at| {
                at.saturating_duration_since(Instant::now()).min(timeout)
            });
            std::thread::sleep(wait);
            return 0;
        }

        let ready = {
            let mut select = Select::new();
            for &i in &live {
                select.recv(self.entries[i].session.events());
            }
            match select.ready_timeout(self.wait_budget(timeout)) {
                Ok(index) => live[index],
                Err(_) => return 0,
            }
        };

        // Drain only the ready session so ordering within it is preserved.
        let handled = self.drain(ready);
        self.after_pump(ready);
        handled
    }

    /// Pump until no log is streaming or waiting to reconnect.
    pub fn run(&mut self) {
        while self.active_count() > 0 {
            self.pump(Duration::from_millis(100));
        }
    }

    /// Close every connection. Rendered content is kept.
    ///
    /// Torn-down logs are no longer pumped and never reconnect.
    pub fn teardown(&mut self) {
        for entry in &mut self.entries {
            entry.session.close();
            entry.reconnect_at = None;
            entry.torn_down = true;
        }
    }

    /// Remove every log and return their final views.
    pub fn into_views(mut self) -> Vec<LogView<S>> {
        self.teardown();
        self.entries.into_iter().map(|e| e.session.into_view()).collect()
    }

    fn build_session(&mut self, source: &LogSource) -> LogSession<S> {
        let sink = (self.make_sink)(source);
        let mut view = LogView::with_mode(source.id.clone(), sink, self.config.line_mode);
        view.seed(&source.seed);
        LogSession::new(view, source.address.as_deref(), &self.config)
    }

    fn is_active(entry: &Entry<S>) -> bool {
        !entry.torn_down
            && (!entry.session.status().is_terminal() || entry.reconnect_at.is_some())
    }

    fn next_reconnect(&self) -> Option<Instant> {
        self.entries.iter().filter_map(|e| e.reconnect_at).min()
    }

    /// Never sleep past a due reconnection.
    fn wait_budget(&self, timeout: Duration) -> Duration {
        self.next_reconnect().map_or(timeout, |at| {
            at.saturating_duration_since(Instant::now()).min(timeout)
        })
    }

    fn drain(&mut self, index: usize) -> usize {
        let entry = &mut self.entries[index];
        let mut handled = 0;
        while !entry.session.status().is_terminal() {
            let event = match entry.session.events().try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                // The connection thread went away without saying goodbye.
                Err(TryRecvError::Disconnected) => ConnectionEvent::Closed,
            };
            if matches!(event, ConnectionEvent::Opened) {
                entry.attempts = 0;
            }
            entry.session.handle_event(event, &mut self.resync);
            handled += 1;
        }
        handled
    }

    /// Schedule a reconnection if the session dropped before finishing.
    fn after_pump(&mut self, index: usize) {
        let policy = &self.config.reconnect;
        let entry = &mut self.entries[index];
        if entry.torn_down || entry.session.status() != SessionStatus::Disconnected {
            return;
        }
        if !policy.allows(entry.attempts) {
            if policy.is_enabled() {
                warn!(log = %entry.source.id, attempts = entry.attempts, "giving up on reconnecting");
            }
            return;
        }
        let delay = policy.delay(entry.attempts);
        entry.attempts += 1;
        entry.reconnect_at = Some(Instant::now() + delay);
        info!(log = %entry.source.id, attempt = entry.attempts, ?delay, "reconnect scheduled");
    }

    /// Rebuild every session whose reconnection is due.
    ///
    /// The server replays its backlog on every connection, so a rebuilt
    /// session starts from a fresh sink and view instead of appending to the
    /// old one.
    fn reconnect_due(&mut self) {
        let now = Instant::now();
        for index in 0..self.entries.len() {
            let due = self.entries[index].reconnect_at.is_some_and(|at| at <= now);
            if !due {
                continue;
            }
            let source = self.entries[index].source.clone();
            info!(log = %source.id, "reconnecting with a fresh view");
            let session = self.build_session(&source);
            let entry = &mut self.entries[index];
            entry.session = session;
            entry.reconnect_at = None;
        }
    }
}
