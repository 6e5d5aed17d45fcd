//! In-memory cache server speaking the line protocol
//!
//! Serves `GET <key>` and `SET <key> <value>` over TCP. The wire format has no
//! TTL field, so every entry expires `default_ttl` after its last write.
//! Expired entries are hidden on read and purged by a periodic cleanup task.

use crate::{
    error::{AppError, Result},
    log_debug, log_info, log_warn,
    logging::Logger,
    protocol::{self, Command, ACK, ERR_PREFIX, MISS_MARKER},
};
use std::{
    collections::HashMap,
    future::Future,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::{RwLock, Semaphore},
    task::JoinHandle,
};

/// Settings for a [`LineCacheServer`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: String,
    pub default_ttl: Duration,
    pub max_connections: usize,
    pub cleanup_interval: Duration,
    /// Longest request line accepted before the connection is dropped
    pub max_line_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:0".to_string(),
            default_ttl: crate::defaults::DEFAULT_TTL,
            max_connections: 10_000,
            cleanup_interval: Duration::from_secs(1),
            max_line_bytes: crate::defaults::DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn new<S: Into<String>>(listen: S) -> Self {
        Self {
            listen: listen.into(),
            ..Self::default()
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Key-value map with per-entry expiry
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, StoredValue>>,
    default_ttl: Duration,
}

impl MemoryStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Value for `key` unless absent or expired
    pub async fn get(&self, key: &str) -> Option<String> {
        let data = self.data.read().await;
        data.get(key)
            .filter(|item| !item.is_expired(Instant::now()))
            .map(|item| item.value.clone())
    }

    /// Store `value`, replacing any previous entry and resetting its expiry
    pub async fn set(&self, key: String, value: String) {
        let item = StoredValue {
            value,
            expires_at: Instant::now() + self.default_ttl,
        };
        self.data.write().await.insert(key, item);
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|_, item| !item.is_expired(now));
        before - data.len()
    }

    /// Number of entries, expired ones included until purged
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// TCP server backed by a [`MemoryStore`]
pub struct LineCacheServer {
    listener: TcpListener,
    store: Arc<MemoryStore>,
    connection_limit: Arc<Semaphore>,
    config: ServerConfig,
    logger: Arc<Logger>,
}

impl LineCacheServer {
    /// Bind the listening socket; `run` starts accepting
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        Self::bind_with_logger(config, Logger::new("SERVER".to_string())).await
    }

    pub async fn bind_with_logger(config: ServerConfig, logger: Logger) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(AppError::config("Server needs at least one connection slot"));
        }
        let listener = TcpListener::bind(&config.listen)
            .await
            .map_err(|e| AppError::connect(format!("Failed to bind {}: {}", config.listen, e)))?;

        Ok(Self {
            listener,
            store: Arc::new(MemoryStore::new(config.default_ttl)),
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            config,
            logger: Arc::new(logger),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    /// Accept connections forever
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        log_info!(self.logger, "Line cache server listening on {}", addr);

        let cleanup = tokio::spawn(cleanup_task(self.store.clone(), self.config.cleanup_interval));
        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = self.connection_limit.clone().acquire_owned() => permit
                    .map_err(|e| AppError::internal(format!("Connection limiter closed: {}", e)))?,
            };

            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    log_debug!(self.logger, "Accepted connection from {}", peer);
                    let store = self.store.clone();
                    let logger = self.logger.clone();
                    let max_line_bytes = self.config.max_line_bytes;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, store, max_line_bytes).await {
                            log_debug!(logger, "Connection from {} closed: {}", peer, e);
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    log_warn!(self.logger, "Failed to accept connection: {}", e);
                }
            }
        }

        cleanup.abort();
        log_info!(self.logger, "Line cache server on {} stopped", addr);
        Ok(())
    }

    /// Run on a background task; the server stops when the handle drops
    pub fn spawn(self) -> Result<ServerHandle> {
        let addr = self.local_addr()?;
        let store = self.store.clone();
        let task = tokio::spawn(self.run());
        Ok(ServerHandle { addr, store, task })
    }
}

/// Handle to a server running on a background task
pub struct ServerHandle {
    addr: SocketAddr,
    store: Arc<MemoryStore>,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    /// Stop accepting; open connections are left to finish on their own
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn cleanup_task(store: Arc<MemoryStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        store.purge_expired().await;
    }
}

/// Answer one request line
async fn respond(line: &str, store: &MemoryStore) -> String {
    match protocol::parse_command(line) {
        Ok(Command::Get { key }) => store.get(&key).await.unwrap_or_else(|| MISS_MARKER.to_string()),
        Ok(Command::Set { key, value }) => {
            store.set(key, value).await;
            ACK.to_string()
        }
        Err(e) => format!("{} {}", ERR_PREFIX, e),
    }
}

async fn handle_connection(stream: TcpStream, store: Arc<MemoryStore>, max_line_bytes: usize) -> Result<()> {
    stream.set_nodelay(true)?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::with_capacity(1024);

    loop {
        line.clear();
        // One byte past the cap is enough to tell an oversized line apart
        let limit = max_line_bytes as u64 + 1;
        let n = (&mut reader).take(limit).read_until(protocol::TERMINATOR, &mut line).await?;
        if n == 0 {
            return Ok(());
        }
        if line.len() > max_line_bytes {
            let reply = format!("{} request exceeds {} bytes", ERR_PREFIX, max_line_bytes);
            write_half.write_all(&protocol::encode_response(&reply)).await?;
            return Err(AppError::protocol("Request line too long"));
        }

        let reply = match std::str::from_utf8(&line) {
            Ok(text) => respond(text, &store).await,
            Err(_) => format!("{} request is not valid UTF-8", ERR_PREFIX),
        };
        write_half.write_all(&protocol::encode_response(&reply)).await?;
    }
}
