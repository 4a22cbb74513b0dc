//! Connection Actor: Dedicated thread for one websocket log stream.
//!
//! The actor performs the handshake, reads frames, decodes them and forwards
//! them to its session over a bounded channel. It has no notion of lines.

use super::messages::{ConnectionEvent, ConnectionState, StreamEvent};
use crate::config::TailConfig;
use crate::error::{Result, TailError};
use crossbeam_channel::{SendTimeoutError, Sender};
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::handshake::HandshakeError;
use tungstenite::{Message, WebSocket};
use url::Url;

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Socket timeouts must be non-zero.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// State shared between the actor handle and its thread.
struct Shared {
    shutdown: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` unless already closed.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if ConnectionState::from_u8(current) == ConnectionState::Closed {
                return false;
            }
            match self.state.compare_exchange(
                current,
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Connection actor that streams one log.
pub struct ConnectionActor {
    /// Handle to the connection thread.
    handle: Option<JoinHandle<()>>,
    /// Shutdown flag and connection state.
    shared: Arc<Shared>,
    /// Address this actor connects to.
    address: String,
}

impl ConnectionActor {
    /// Open a connection to `address` on a new thread.
    ///
    /// Returns immediately in [`ConnectionState::Connecting`]. Failures,
    /// including an unparseable address, arrive as
    /// [`ConnectionEvent::Error`] followed by [`ConnectionEvent::Closed`].
    pub fn open(address: &str, sender: Sender<ConnectionEvent>, config: &TailConfig) -> Self {
        let shared = Arc::new(Shared {
            shutdown: AtomicBool::new(false),
            state: AtomicU8::new(ConnectionState::Connecting.as_u8()),
        });
        let thread_shared = Arc::clone(&shared);
        let thread_address = address.to_string();
        let config = config.clone();

        let spawned = thread::Builder::new()
            .name("logtail-connection".to_string())
            .spawn(move || {
                Self::run(&thread_address, &sender, &thread_shared, &config);
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(address, error = %e, "failed to spawn connection thread");
                shared.transition(ConnectionState::Closed);
                None
            }
        };

        Self {
            handle,
            shared,
            address: address.to_string(),
        }
    }

    /// The address this actor was opened with.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Release the connection. No events are delivered afterwards.
    ///
    /// Idempotent. Already-rendered content is unaffected.
    pub fn close(&self) {
        if self.shared.transition(ConnectionState::Closed) {
            debug!(address = %self.address, "closing connection");
        }
        self.shared.shutdown.store(true, Ordering::Relaxed);
    }

    /// Close and wait for the connection thread to exit.
    pub fn join(mut self) {
        self.close();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Thread body.
    fn run(address: &str, sender: &Sender<ConnectionEvent>, shared: &Shared, config: &TailConfig) {
        let mut socket = match Self::connect(address, config) {
            Ok(socket) => socket,
            Err(e) => {
                error!(address, error = %e, "failed to connect");
                if shared.transition(ConnectionState::Closed) {
                    Self::deliver(sender, shared, ConnectionEvent::Error(e));
                    Self::deliver(sender, shared, ConnectionEvent::Closed);
                }
                return;
            }
        };

        if !shared.transition(ConnectionState::Open) {
            // Closed while the handshake was in flight.
            let _ = socket.close(None);
            let _ = socket.flush();
            return;
        }
        debug!(address, "connected");
        Self::deliver(sender, shared, ConnectionEvent::Opened);

        let failure = Self::read_loop(&mut socket, sender, shared);

        if shared.is_shutdown() {
            let _ = socket.close(None);
            let _ = socket.flush();
        }
        if shared.transition(ConnectionState::Closed) {
            if let Some(e) = failure {
                error!(address, error = %e, "connection failed");
                Self::deliver(sender, shared, ConnectionEvent::Error(e));
            }
            debug!(address, "connection closed");
            Self::deliver(sender, shared, ConnectionEvent::Closed);
        }
    }

    /// Validate the address, connect and perform the handshake.
    ///
    /// The TCP connect and the handshake are each bounded by
    /// [`TailConfig::handshake_timeout`].
    fn connect(address: &str, config: &TailConfig) -> Result<Socket> {
        let handshake_timeout = config.handshake_timeout.max(MIN_TIMEOUT);
        let read_timeout = config.read_timeout.max(MIN_TIMEOUT);
        let url = Url::parse(address)?;
        match url.scheme() {
            "ws" => {}
            "wss" => {
                return Err(TailError::Connection(
                    "wss:// requires TLS, which this build does not include".to_string(),
                ))
            }
            other => {
                return Err(TailError::Config(format!(
                    "unsupported scheme `{other}` (expected ws or wss)"
                )))
            }
        }

        let stream = Self::connect_tcp(&url, handshake_timeout)?;
        stream.set_read_timeout(Some(handshake_timeout))?;
        stream.set_write_timeout(Some(handshake_timeout))?;

        let (socket, _response) =
            tungstenite::client(url.as_str(), MaybeTlsStream::Plain(stream)).map_err(|e| match e {
                HandshakeError::Failure(e) => TailError::from(e),
                HandshakeError::Interrupted(_) => {
                    TailError::Connection(format!("handshake timed out after {handshake_timeout:?}"))
                }
            })?;
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream.set_read_timeout(Some(read_timeout))?;
            stream.set_write_timeout(None)?;
        }
        Ok(socket)
    }

    /// Connect to the first address of `url` that answers in time.
    fn connect_tcp(url: &Url, timeout: Duration) -> Result<TcpStream> {
        let addrs = url
            .socket_addrs(|| None)
            .map_err(|e| TailError::Connection(format!("cannot resolve {url}: {e}")))?;
        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.map_or_else(
            || TailError::Connection(format!("no address for {url}")),
            |e| TailError::Connection(format!("failed to connect to {url}: {e}")),
        ))
    }

    /// Read frames until the peer closes, the transport fails, or shutdown.
    ///
    /// Returns the transport error, if any.
    fn read_loop(socket: &mut Socket, sender: &Sender<ConnectionEvent>, shared: &Shared) -> Option<TailError> {
        loop {
            if shared.is_shutdown() {
                return None;
            }

            let message = match socket.read() {
                Ok(message) => message,
                Err(tungstenite::Error::Io(e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(e) => return Some(e.into()),
            };

            let decoded = match &message {
                Message::Text(text) => StreamEvent::decode(text),
                Message::Binary(bytes) => StreamEvent::decode_bytes(bytes),
                Message::Close(_) => {
                    debug!("server closed the stream");
                    continue;
                }
                _ => continue,
            };

            match decoded {
                Ok(Some(event)) => {
                    trace!(?event, "frame");
                    if !Self::deliver(sender, shared, ConnectionEvent::Stream(event)) {
                        return None;
                    }
                }
                Ok(None) => trace!("ignoring frame of unknown type"),
                Err(e) => warn!(error = %e, "dropping undecodable frame"),
            }
        }
    }

    /// Send an event, blocking while the channel is full.
    ///
    /// Returns `false` once the actor is shut down or the receiver is gone.
    fn deliver(sender: &Sender<ConnectionEvent>, shared: &Shared, event: ConnectionEvent) -> bool {
        let mut event = event;
        loop {
            match sender.send_timeout(event, Duration::from_millis(50)) {
                Ok(()) => return true,
                Err(SendTimeoutError::Disconnected(_)) => return false,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if shared.is_shutdown() {
                        return false;
                    }
                    event = returned;
                }
            }
        }
    }
}

impl Drop for ConnectionActor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, Receiver};
    use std::net::TcpListener;
    use std::time::Instant;

    /// Serve `frames` to the first client, then hold the socket open until
    /// the client goes away (or close it when `close_after` is set).
    fn serve(frames: Vec<String>, close_after: bool) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("ws://{}/job-1/", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut socket = tungstenite::accept(stream).unwrap();
            for frame in frames {
                socket.send(Message::Text(frame)).unwrap();
            }
            if close_after {
                let _ = socket.close(None);
            }
            // Drain until the client disconnects.
            while socket.read().is_ok() {}
        });
        (address, handle)
    }

    fn collect_until_closed(rx: &Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            if let Ok(event) = rx.recv_timeout(Duration::from_millis(100)) {
                let closed = matches!(event, ConnectionEvent::Closed);
                events.push(event);
                if closed {
                    break;
                }
            }
        }
        events
    }

    #[test]
    fn test_frames_arrive_in_order() {
        let frames = vec![
            r#"{"type":"message","content":"one\n"}"#.to_string(),
            r#"{"type":"other","content":"x"}"#.to_string(),
            "garbage".to_string(),
            r#"{"type":"message","content":"two\n"}"#.to_string(),
            r#"{"type":"status","content":"finished"}"#.to_string(),
        ];
        let (address, server) = serve(frames, true);
        let (tx, rx) = bounded(16);
        let actor = ConnectionActor::open(&address, tx, &TailConfig::default());

        let events = collect_until_closed(&rx);
        assert!(matches!(events.first(), Some(ConnectionEvent::Opened)));
        let stream: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ConnectionEvent::Stream(event) => Some(event.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            stream,
            vec![
                StreamEvent::Message("one\n".to_string()),
                StreamEvent::Message("two\n".to_string()),
                StreamEvent::Status("finished".to_string()),
            ]
        );
        assert!(matches!(events.last(), Some(ConnectionEvent::Closed)));
        assert_eq!(actor.state(), ConnectionState::Closed);

        actor.join();
        server.join().unwrap();
    }

    #[test]
    fn test_connection_failure_is_reported() {
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let (tx, rx) = bounded(4);
        let actor = ConnectionActor::open(&format!("ws://127.0.0.1:{port}/"), tx, &TailConfig::default());

        let events = collect_until_closed(&rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ConnectionEvent::Error(TailError::Connection(_))));
        assert!(matches!(events[1], ConnectionEvent::Closed));
        assert_eq!(actor.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_invalid_address_is_reported() {
        let (tx, rx) = bounded(4);
        let _actor = ConnectionActor::open("http://example.invalid/", tx, &TailConfig::default());

        let events = collect_until_closed(&rx);
        assert!(matches!(events[0], ConnectionEvent::Error(TailError::Config(_))));
        assert!(matches!(events[1], ConnectionEvent::Closed));
    }

    #[test]
    fn test_silent_peer_times_out_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("ws://{}/", listener.local_addr().unwrap());
        let (done_tx, done_rx) = bounded::<()>(1);
        let server = thread::spawn(move || {
            // Accept, then never answer the handshake.
            let (_stream, _) = listener.accept().unwrap();
            let _ = done_rx.recv_timeout(Duration::from_secs(5));
        });

        let config = TailConfig {
            handshake_timeout: Duration::from_millis(200),
            ..TailConfig::default()
        };
        let (tx, rx) = bounded(4);
        let started = Instant::now();
        let actor = ConnectionActor::open(&address, tx, &config);

        let events = collect_until_closed(&rx);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ConnectionEvent::Error(TailError::Connection(_))));
        assert!(matches!(events[1], ConnectionEvent::Closed));
        actor.join();

        done_tx.send(()).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_wss_is_a_connection_error() {
        let (tx, rx) = bounded(4);
        let _actor = ConnectionActor::open("wss://127.0.0.1:1/", tx, &TailConfig::default());

        let events = collect_until_closed(&rx);
        assert!(matches!(events[0], ConnectionEvent::Error(TailError::Connection(_))));
        assert!(matches!(events[1], ConnectionEvent::Closed));
    }

    #[test]
    fn test_close_stops_delivery() {
        let (address, server) = serve(Vec::new(), false);
        let (tx, rx) = bounded(16);
        let actor = ConnectionActor::open(&address, tx, &TailConfig::default());

        let opened = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(opened, ConnectionEvent::Opened));
        assert_eq!(actor.state(), ConnectionState::Open);

        actor.close();
        assert_eq!(actor.state(), ConnectionState::Closed);
        actor.join();

        assert!(rx.try_recv().is_err());
        server.join().unwrap();
    }
}
