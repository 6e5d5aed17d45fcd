//! Round-robin pool of line protocol connections

use crate::{
    backend::{Ack, CacheBackend, LineClientConfig, LineProtocolClient},
    error::{AppError, Result},
    logging::ConnectionLogger,
    types::BackendKind,
};
use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Upper bound on pool members
pub const MAX_POOL_SIZE: usize = 256;

/// A fixed set of line clients, one per concurrency slot, picked round-robin per call.
///
/// Each member keeps its own connection and its own mutex, so concurrent calls
/// spread across `size` sockets instead of queueing behind one.
pub struct LinePool {
    clients: Vec<Arc<LineProtocolClient>>,
    next: AtomicUsize,
}

impl LinePool {
    pub fn new(config: LineClientConfig, size: usize) -> Result<Self> {
        Self::build(config, size, None)
    }

    pub fn with_logger(config: LineClientConfig, size: usize, logger: Arc<ConnectionLogger>) -> Result<Self> {
        Self::build(config, size, Some(logger))
    }

    fn build(config: LineClientConfig, size: usize, logger: Option<Arc<ConnectionLogger>>) -> Result<Self> {
        if size == 0 || size > MAX_POOL_SIZE {
            return Err(AppError::validation(format!(
                "Pool size must be between 1 and {}, got {}",
                MAX_POOL_SIZE, size
            )));
        }

        let clients = (0..size)
            .map(|slot| {
                let client = LineProtocolClient::new(config.clone())
                    .with_name(format!("{}#{}", BackendKind::TcpPool.display_name(), slot));
                let client = match logger {
                    Some(ref logger) => client.with_logger(logger.clone()),
                    None => client,
                };
                Arc::new(client)
            })
            .collect();

        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.clients.len()
    }

    /// Members in slot order
    pub fn clients(&self) -> &[Arc<LineProtocolClient>] {
        &self.clients
    }

    fn pick(&self) -> &LineProtocolClient {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[slot]
    }

    /// Close every member connection
    pub async fn close(&self) {
        for client in &self.clients {
            client.close().await;
        }
    }
}

#[async_trait]
impl CacheBackend for LinePool {
    fn name(&self) -> &str {
        BackendKind::TcpPool.display_name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::TcpPool
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.pick().get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<Ack> {
        self.pick().set(key, value, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_bounds() {
        let config = LineClientConfig::new("127.0.0.1:6060");
        assert!(LinePool::new(config.clone(), 0).is_err());
        assert!(LinePool::new(config.clone(), MAX_POOL_SIZE + 1).is_err());
        assert_eq!(LinePool::new(config, 4).unwrap().size(), 4);
    }

    #[test]
    fn test_round_robin_visits_every_slot() {
        let pool = LinePool::new(LineClientConfig::new("127.0.0.1:6060"), 3).unwrap();
        let picked: Vec<String> = (0..6).map(|_| pool.pick().name().to_string()).collect();
        assert_eq!(
            picked,
            vec![
                "LineTcpPool#0",
                "LineTcpPool#1",
                "LineTcpPool#2",
                "LineTcpPool#0",
                "LineTcpPool#1",
                "LineTcpPool#2",
            ]
        );
        assert_eq!(pool.name(), "LineTcpPool");
    }
}
