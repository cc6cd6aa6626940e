//! WebSocket client for the scoreboard server's `/WS` endpoint.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::{SinkExt, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::watch,
    task::JoinHandle,
    time::{self as clock, MissedTickBehavior, interval_at, sleep_until, timeout},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use tracing::{debug, info, warn};

use super::{
    merger::{DEFAULT_CLOCK_PREFIX, SnapshotMerger},
    message::{DecodeError, UpdateMessage},
    publisher::SnapshotPublisher,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Paths the client registers for unless configured otherwise.
pub const DEFAULT_REGISTER_PATHS: [&str; 2] =
    ["ScoreBoard.Version(release)", "ScoreBoard.CurrentGame"];
/// Default bound on the TCP + TLS + WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default spacing of the application-level ping frames.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
/// Keepalive spacing is clamped into this range.
const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);
const MAX_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(3600);

/// Lifecycle of one scoreboard connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected (initial state, or closed by either side).
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Registered and receiving updates.
    Connected,
    /// The connection could not be established or broke; carries the reason.
    Failed(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Connection-level failures. Each one ends the current client.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The handshake did not finish within the configured timeout.
    #[error("connection to {url} timed out after {after:?}")]
    Timeout {
        /// Target URL.
        url: String,
        /// Configured timeout.
        after: Duration,
    },
    /// DNS, TCP, TLS or HTTP upgrade failure.
    #[error("could not connect to {url}: {source}")]
    Handshake {
        /// Target URL.
        url: String,
        /// Underlying error.
        #[source]
        source: tungstenite::Error,
    },
    /// The registration frame could not be sent.
    #[error("could not register with the scoreboard: {0}")]
    Register(#[source] tungstenite::Error),
    /// Reading or writing an established connection failed.
    #[error("scoreboard connection broke: {0}")]
    Transport(#[source] tungstenite::Error),
}

/// Where and how to reach the scoreboard.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Scoreboard host name or address.
    pub host: String,
    /// Scoreboard port.
    pub port: u16,
    /// Use `wss://` instead of `ws://`.
    pub use_ssl: bool,
    /// Bound on the connection handshake.
    pub connect_timeout: Duration,
    /// Spacing of application-level ping frames.
    pub keepalive_interval: Duration,
    /// Paths sent in the registration frame.
    pub register_paths: Vec<String>,
    /// Path prefixes whose changes never trigger a publish by themselves.
    pub clock_prefixes: Vec<String>,
}

impl Endpoint {
    /// Endpoint with default timeouts, registration paths and clock prefixes.
    pub fn new(host: impl Into<String>, port: u16, use_ssl: bool) -> Self {
        Self {
            host: host.into(),
            port,
            use_ssl,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            register_paths: DEFAULT_REGISTER_PATHS.map(String::from).to_vec(),
            clock_prefixes: vec![DEFAULT_CLOCK_PREFIX.to_string()],
        }
    }

    /// WebSocket URL of the scoreboard's state feed.
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "wss" } else { "ws" };
        format!("{scheme}://{}:{}/WS", self.host, self.port)
    }
}

/// Cloneable handle that closes a client's connection.
///
/// Closing makes a pending receive return promptly; it is the only way to
/// cancel a running client.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl ShutdownHandle {
    /// Request the connection(s) observing this handle to close.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    /// True once [`ShutdownHandle::close`] was called.
    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the handle is closed.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// One connection to the scoreboard, owning the working document.
pub struct ScoreboardClient {
    endpoint: Endpoint,
    publisher: Arc<SnapshotPublisher>,
    merger: SnapshotMerger,
    generation: u64,
    state: Arc<watch::Sender<ConnectionState>>,
    shutdown: ShutdownHandle,
    socket: Option<Socket>,
    frames_dropped: u64,
    /// Merger revision of this client's latest published snapshot.
    published_revision: u64,
    /// When the throttled changes become publishable.
    flush_at: Option<clock::Instant>,
}

impl ScoreboardClient {
    /// Create a disconnected client that publishes into `publisher`.
    pub fn new(endpoint: Endpoint, publisher: Arc<SnapshotPublisher>) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        let merger = SnapshotMerger::new(endpoint.clock_prefixes.clone());
        let generation = publisher.next_generation();
        Self {
            endpoint,
            publisher,
            merger,
            generation,
            state: Arc::new(state),
            shutdown: ShutdownHandle::default(),
            socket: None,
            frames_dropped: 0,
            published_revision: 0,
            flush_at: None,
        }
    }

    /// Report connection state into an externally owned channel.
    pub fn with_state_sender(mut self, state: Arc<watch::Sender<ConnectionState>>) -> Self {
        state.send_replace(self.state.borrow().clone());
        self.state = state;
        self
    }

    /// Observe a shared shutdown handle instead of a private one.
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Receiver tracking this client's [`ConnectionState`].
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Handle closing this client's connection.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Working document as merged so far.
    pub fn document(&self) -> &serde_json::Value {
        self.merger.document()
    }

    /// Open the connection and register for state updates.
    ///
    /// Failures are logged and reported as [`ConnectionState::Failed`]; they
    /// never panic or propagate.
    pub async fn connect(&mut self) -> ConnectionState {
        let url = self.endpoint.url();
        self.set_state(ConnectionState::Connecting);
        info!(%url, "connecting to scoreboard");

        let handshake = timeout(self.endpoint.connect_timeout, connect_async(url.as_str()));
        let mut socket = tokio::select! {
            _ = self.shutdown.closed() => {
                return self.set_state(ConnectionState::Disconnected);
            }
            attempt = handshake => match attempt {
                Ok(Ok((socket, _response))) => socket,
                Ok(Err(source)) => {
                    return self.fail(ConnectionError::Handshake { url, source });
                }
                Err(_) => {
                    return self.fail(ConnectionError::Timeout {
                        url,
                        after: self.endpoint.connect_timeout,
                    });
                }
            }
        };

        let register = json!({
            "action": "Register",
            "paths": self.endpoint.register_paths,
        });
        if let Err(err) = socket.send(Message::Text(register.to_string().into())).await {
            return self.fail(ConnectionError::Register(err));
        }

        info!(%url, paths = ?self.endpoint.register_paths, "registered with scoreboard");
        self.socket = Some(socket);
        self.set_state(ConnectionState::Connected)
    }

    /// Receive and merge frames until the connection ends.
    ///
    /// Malformed frames are dropped. Returns [`ConnectionState::Disconnected`]
    /// after a close by either side and [`ConnectionState::Failed`] after a
    /// transport error. Calling it without a successful
    /// [`ScoreboardClient::connect`] returns the current state immediately.
    pub async fn run(&mut self) -> ConnectionState {
        let Some(socket) = self.socket.take() else {
            return self.state.borrow().clone();
        };
        let (mut sink, mut stream) = socket.split();

        let keepalive_every = self
            .endpoint
            .keepalive_interval
            .clamp(MIN_KEEPALIVE_INTERVAL, MAX_KEEPALIVE_INTERVAL);
        let mut keepalive = interval_at(clock::Instant::now() + keepalive_every, keepalive_every);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = self.shutdown.clone();

        let outcome = loop {
            tokio::select! {
                _ = shutdown.closed() => {
                    info!("closing scoreboard connection");
                    let _ = sink.send(Message::Close(None)).await;
                    break ConnectionState::Disconnected;
                }
                next = stream.next() => match next {
                    Some(Ok(Message::Text(text))) => {
                        self.handle_frame(UpdateMessage::from_json_str(text.as_str()));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        self.handle_frame(UpdateMessage::from_json_bytes(&bytes));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "scoreboard closed the connection");
                        break ConnectionState::Disconnected;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        let err = ConnectionError::Transport(err);
                        warn!(error = %err, "scoreboard receive failed");
                        break ConnectionState::Failed(err.to_string());
                    }
                    None => {
                        info!("scoreboard stream ended");
                        break ConnectionState::Disconnected;
                    }
                },
                _ = keepalive.tick() => {
                    let ping = json!({ "action": "Ping" }).to_string();
                    if let Err(err) = sink.send(Message::Text(ping.into())).await {
                        let err = ConnectionError::Transport(err);
                        warn!(error = %err, "scoreboard keepalive failed");
                        break ConnectionState::Failed(err.to_string());
                    }
                }
                _ = sleep_until(self.flush_at.unwrap_or_else(clock::Instant::now)),
                    if self.flush_at.is_some() => self.offer(),
            }
        };

        // Whatever arrived after the last publish is offered once more.
        self.offer();
        info!(
            state = %outcome,
            messages_merged = self.merger.messages_merged(),
            frames_dropped = self.frames_dropped,
            "scoreboard connection ended"
        );
        self.set_state(outcome)
    }

    /// Connect and, on success, run the receive loop on a dedicated task.
    pub fn spawn(mut self) -> JoinHandle<ConnectionState> {
        tokio::spawn(async move {
            match self.connect().await {
                ConnectionState::Connected => self.run().await,
                other => other,
            }
        })
    }

    fn handle_frame(&mut self, decoded: Result<UpdateMessage, DecodeError>) {
        match decoded {
            Ok(message) => {
                let report = self.merger.apply(message);
                if report.dirty {
                    self.offer();
                }
            }
            Err(err) => {
                self.frames_dropped += 1;
                warn!(error = %err, "dropping undecodable scoreboard frame");
            }
        }
    }

    /// Offer the working document; a throttled change arms `flush_at` for the
    /// instant the publisher accepts it again.
    fn offer(&mut self) {
        let revision = self.merger.revision();
        if let Some(snapshot) = self.publisher.offer(
            self.merger.document(),
            self.generation,
            revision,
            self.merger.messages_merged(),
            Instant::now(),
        ) {
            debug!(sequence = snapshot.sequence, "offered snapshot was published");
            self.published_revision = revision;
        }
        self.flush_at = if revision > self.published_revision {
            self.publisher.next_due().map(clock::Instant::from_std)
        } else {
            None
        };
    }

    fn fail(&self, err: ConnectionError) -> ConnectionState {
        warn!(error = %err, "scoreboard connection failed");
        self.set_state(ConnectionState::Failed(err.to_string()))
    }

    fn set_state(&self, state: ConnectionState) -> ConnectionState {
        self.state.send_replace(state.clone());
        state
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn builds_plain_and_tls_urls() {
        assert_eq!(
            Endpoint::new("scoreboard.local", 8000, false).url(),
            "ws://scoreboard.local:8000/WS"
        );
        assert_eq!(
            Endpoint::new("10.0.0.2", 443, true).url(),
            "wss://10.0.0.2:443/WS"
        );
    }

    #[test]
    fn default_registration_covers_version_and_current_game() {
        let endpoint = Endpoint::new("localhost", 8000, false);
        assert_eq!(
            endpoint.register_paths,
            ["ScoreBoard.Version(release)", "ScoreBoard.CurrentGame"]
        );
    }

    #[tokio::test]
    async fn refused_connection_reports_failed_without_snapshot() {
        // Reserve a port, then free it so nothing is listening there.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let publisher = Arc::new(SnapshotPublisher::default());
        let mut endpoint = Endpoint::new("127.0.0.1", port, false);
        endpoint.connect_timeout = Duration::from_secs(5);
        let mut client = ScoreboardClient::new(endpoint, Arc::clone(&publisher));
        let state_rx = client.state();

        let state = client.connect().await;
        assert!(matches!(state, ConnectionState::Failed(_)), "{state:?}");
        assert_eq!(*state_rx.borrow(), state);
        assert!(publisher.get_snapshot().is_not_ready());

        // Running a client that never connected is a no-op.
        assert_eq!(client.run().await, state);
    }

    #[tokio::test]
    async fn closed_handle_cancels_connect() {
        let publisher = Arc::new(SnapshotPublisher::default());
        let mut client =
            ScoreboardClient::new(Endpoint::new("127.0.0.1", 9, false), publisher);
        client.shutdown_handle().close();
        assert_eq!(client.connect().await, ConnectionState::Disconnected);
    }
}
