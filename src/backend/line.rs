//! TCP line protocol client
//!
//! One client owns at most one connection. The connection is opened lazily on
//! the first call, reused for every later call, and dropped when an I/O error,
//! timeout or framing error is seen; the next call then reconnects. There is
//! no background reconnect and no retry inside the client.
//!
//! A request and its response form one critical section: the connection sits
//! behind an async mutex held from the first written byte until the response
//! terminator has been read, so concurrent callers sharing one client are
//! serialized instead of interleaving on the stream.

use crate::{
    backend::{Ack, CacheBackend},
    error::{AppError, Result},
    logging::ConnectionLogger,
    models::Config,
    protocol::{self, GetReply, Request, TERMINATOR},
    types::BackendKind,
};
use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
    time::timeout,
};

/// Initial capacity of the per-connection read buffer
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Lifecycle of the client's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// No socket exists
    Disconnected = 0,
    /// Connect attempt in flight
    Connecting = 1,
    /// Socket established and idle
    Connected = 2,
    /// Request written, waiting for the response terminator
    AwaitingResponse = 3,
    /// Last operation failed; the socket was discarded
    Faulted = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::AwaitingResponse,
            4 => Self::Faulted,
            _ => Self::Disconnected,
        }
    }
}

/// Settings for a line protocol client
#[derive(Debug, Clone)]
pub struct LineClientConfig {
    /// `host:port` of the cache process
    pub addr: String,
    /// Upper bound on establishing the TCP connection
    pub connect_timeout: Duration,
    /// Upper bound on one request/response exchange
    pub io_timeout: Duration,
    /// Longest response line accepted before the frame is declared invalid
    pub max_response_bytes: usize,
}

impl LineClientConfig {
    pub fn new<S: Into<String>>(addr: S) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }
}

impl Default for LineClientConfig {
    fn default() -> Self {
        Self {
            addr: crate::defaults::DEFAULT_TCP_ADDR.to_string(),
            connect_timeout: crate::defaults::DEFAULT_CONNECT_TIMEOUT,
            io_timeout: crate::defaults::DEFAULT_CALL_TIMEOUT,
            max_response_bytes: crate::defaults::DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl From<&Config> for LineClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            addr: config.tcp_addr.clone(),
            connect_timeout: config.connect_timeout(),
            io_timeout: config.call_timeout(),
            max_response_bytes: crate::defaults::DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// An established connection, split so reads go through a buffer
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Set while an exchange is between its first written byte and its terminator
    in_flight: bool,
}

impl Connection {
    fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, read_half),
            writer: write_half,
            in_flight: false,
        }
    }

    /// True if the connection can no longer be trusted to pair a request with its response:
    /// an earlier exchange was cancelled midway, the peer closed the socket, or
    /// unsolicited bytes are waiting on it
    fn is_stale(&self) -> bool {
        if self.in_flight || !self.reader.buffer().is_empty() {
            return true;
        }
        let mut peek = [0u8; 1];
        match self.reader.get_ref().try_read(&mut peek) {
            Ok(_) => true,
            Err(e) => e.kind() != std::io::ErrorKind::WouldBlock,
        }
    }

    /// Write one request and read until the response terminator
    async fn exchange(&mut self, request: &[u8], limit: usize) -> Result<String> {
        self.in_flight = true;
        self.writer.write_all(request).await?;
        self.writer.flush().await?;

        let mut frame: Vec<u8> = Vec::new();
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Err(if frame.is_empty() {
                    AppError::connect("connection closed by peer before any response")
                } else {
                    AppError::protocol(format!(
                        "connection closed after {} bytes without a response terminator",
                        frame.len()
                    ))
                });
            }

            if let Some(pos) = available.iter().position(|&b| b == TERMINATOR) {
                frame.extend_from_slice(&available[..pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let consumed = available.len();
            frame.extend_from_slice(available);
            self.reader.consume(consumed);

            if frame.len() > limit {
                return Err(AppError::protocol(format!(
                    "response exceeded {} bytes without a terminator",
                    limit
                )));
            }
        }

        if frame.len() > limit {
            return Err(AppError::protocol(format!(
                "response of {} bytes exceeds the {} byte limit",
                frame.len(),
                limit
            )));
        }

        self.in_flight = false;
        protocol::decode_line(&frame).map(str::to_string)
    }
}

/// Cache client speaking the GET/SET line protocol over one TCP connection
pub struct LineProtocolClient {
    name: String,
    config: LineClientConfig,
    connection: Mutex<Option<Connection>>,
    state: AtomicU8,
    connects: AtomicU64,
    round_trips: AtomicU64,
    logger: Option<Arc<ConnectionLogger>>,
}

impl LineProtocolClient {
    /// Create a disconnected client; nothing is opened until the first call
    pub fn new(config: LineClientConfig) -> Self {
        Self {
            name: BackendKind::Tcp.display_name().to_string(),
            config,
            connection: Mutex::new(None),
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            connects: AtomicU64::new(0),
            round_trips: AtomicU64::new(0),
            logger: None,
        }
    }

    /// Convenience constructor with default timeouts
    pub fn connect_to<S: Into<String>>(addr: S) -> Self {
        Self::new(LineClientConfig::new(addr))
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_logger(mut self, logger: Arc<ConnectionLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of successful connects since creation
    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Number of completed request/response exchanges
    pub fn round_trip_count(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    async fn open(&self) -> Result<Connection> {
        self.set_state(ConnectionState::Connecting);
        let started = Instant::now();

        let outcome = match timeout(self.config.connect_timeout, TcpStream::connect(&self.config.addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(AppError::connect(format!("{}: {}", self.config.addr, e))),
            Err(_) => Err(AppError::timeout(format!(
                "connect to {} exceeded {:?}",
                self.config.addr, self.config.connect_timeout
            ))),
        };

        if let Some(ref logger) = self.logger {
            logger
                .log_connect(
                    &self.config.addr,
                    outcome.is_ok(),
                    started.elapsed().as_secs_f64() * 1000.0,
                    outcome.as_ref().err(),
                )
                .await;
        }

        match outcome {
            Ok(stream) => {
                // Requests are small; send each without coalescing
                stream.set_nodelay(true)?;
                let connects = self.connects.fetch_add(1, Ordering::Relaxed) + 1;
                self.set_state(ConnectionState::Connected);
                if connects > 1 {
                    if let Some(ref logger) = self.logger {
                        logger.log_reconnect(&self.config.addr, connects).await;
                    }
                }
                Ok(Connection::new(stream))
            }
            Err(e) => {
                self.set_state(ConnectionState::Faulted);
                Err(e)
            }
        }
    }

    /// Send one encoded request and return the trimmed response line
    async fn round_trip(&self, request: &[u8]) -> Result<String> {
        let mut slot = self.connection.lock().await;

        if slot.as_ref().is_some_and(Connection::is_stale) {
            *slot = None;
            self.set_state(ConnectionState::Faulted);
            if let Some(ref logger) = self.logger {
                logger
                    .log_fault(&self.config.addr, &AppError::connect("peer closed idle connection"))
                    .await;
            }
        }

        if slot.is_none() {
            *slot = Some(self.open().await?);
        }

        let Some(connection) = slot.as_mut() else {
            return Err(AppError::internal("line connection missing after connect"));
        };

        self.set_state(ConnectionState::AwaitingResponse);
        let outcome = match timeout(
            self.config.io_timeout,
            connection.exchange(request, self.config.max_response_bytes),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!(
                "no response from {} within {:?}",
                self.config.addr, self.config.io_timeout
            ))),
        };

        match outcome {
            Ok(line) => {
                self.round_trips.fetch_add(1, Ordering::Relaxed);
                self.set_state(ConnectionState::Connected);
                Ok(line)
            }
            Err(e) if e.faults_connection() => {
                *slot = None;
                self.set_state(ConnectionState::Faulted);
                if let Some(ref logger) = self.logger {
                    logger.log_fault(&self.config.addr, &e).await;
                }
                Err(e)
            }
            Err(e) => {
                self.set_state(ConnectionState::Connected);
                Err(e)
            }
        }
    }

    /// Drop the connection, if any, and return to `Disconnected`
    pub async fn close(&self) {
        let mut slot = self.connection.lock().await;
        if let Some(mut connection) = slot.take() {
            let _ = connection.writer.shutdown().await;
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

#[async_trait]
impl CacheBackend for LineProtocolClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Tcp
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let request = Request::get(key)?.encode();
        let line = self.round_trip(&request).await?;
        match protocol::parse_get_reply(&line)? {
            GetReply::Hit(value) => Ok(Some(value)),
            GetReply::Miss => Ok(None),
        }
    }

    /// The wire format has no TTL field; expiry is the server's default
    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<Ack> {
        let request = Request::set(key, value)?.encode();
        let line = self.round_trip(&request).await?;
        protocol::parse_set_reply(&line)?;
        Ok(Ack)
    }
}
