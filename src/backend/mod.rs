//! Cache backends behind a single get/set capability
//!
//! The harness only ever sees `Arc<dyn CacheBackend>`; the concrete clients
//! are:
//! - [`LineProtocolClient`]: one persistent TCP connection, text framing
//! - [`LinePool`]: several line clients picked round-robin per call
//! - [`HttpCacheClient`]: JSON over HTTP
//! - [`ManagedCacheClient`]: Redis

pub mod http;
pub mod line;
pub mod managed;
pub mod pool;

pub use http::HttpCacheClient;
pub use line::{ConnectionState, LineClientConfig, LineProtocolClient};
pub use managed::ManagedCacheClient;
pub use pool::LinePool;

use crate::{
    error::Result,
    logging::ConnectionLogger,
    models::Config,
    types::BackendKind,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Acknowledgement of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Uniform get/set capability implemented by every cache client
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Name used in reports
    fn name(&self) -> &str;

    /// Which backend family this is
    fn kind(&self) -> BackendKind;

    /// Read a key; a miss is `Ok(None)`, never an error
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key with the given expiry
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<Ack>;

    /// Write a key with the default expiry
    async fn set_default(&self, key: &str, value: &str) -> Result<Ack> {
        self.set(key, value, crate::defaults::DEFAULT_TTL).await
    }
}

/// Builds backends from configuration
pub struct BackendFactory<'a> {
    config: &'a Config,
    logger: Option<Arc<ConnectionLogger>>,
}

impl<'a> BackendFactory<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config, logger: None }
    }

    /// Attach a logger for line connection events
    pub fn with_logger(mut self, logger: Arc<ConnectionLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Create one backend of the requested kind
    pub async fn create(&self, kind: BackendKind) -> Result<Arc<dyn CacheBackend>> {
        let config = self.config;
        let backend: Arc<dyn CacheBackend> = match kind {
            BackendKind::Tcp => {
                let client = LineProtocolClient::new(LineClientConfig::from(config));
                match self.logger {
                    Some(ref logger) => Arc::new(client.with_logger(logger.clone())),
                    None => Arc::new(client),
                }
            }
            BackendKind::TcpPool => {
                let line_config = LineClientConfig::from(config);
                match self.logger {
                    Some(ref logger) => Arc::new(LinePool::with_logger(line_config, config.pool_size, logger.clone())?),
                    None => Arc::new(LinePool::new(line_config, config.pool_size)?),
                }
            }
            BackendKind::Http => Arc::new(HttpCacheClient::new(
                &config.http_url,
                config.connect_timeout(),
                config.call_timeout(),
            )?),
            BackendKind::Redis => Arc::new(
                ManagedCacheClient::connect(
                    &config.redis_url,
                    config.redis_instance.clone(),
                    config.connect_timeout(),
                )
                .await?,
            ),
        };
        Ok(backend)
    }

    /// Create every configured backend, in configuration order
    pub async fn create_all(&self) -> Vec<(BackendKind, Result<Arc<dyn CacheBackend>>)> {
        let mut backends = Vec::with_capacity(self.config.backends.len());
        for kind in &self.config.backends {
            backends.push((*kind, self.create(*kind).await));
        }
        backends
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_builds_lazy_backends_without_network() {
        let config = Config::default();
        let factory = BackendFactory::new(&config);

        let tcp = factory.create(BackendKind::Tcp).await.unwrap();
        assert_eq!(tcp.name(), "LineTcp");
        assert_eq!(tcp.kind(), BackendKind::Tcp);

        let pool = factory.create(BackendKind::TcpPool).await.unwrap();
        assert_eq!(pool.kind(), BackendKind::TcpPool);

        let http = factory.create(BackendKind::Http).await.unwrap();
        assert_eq!(http.name(), "HttpCache");
    }

    #[tokio::test]
    async fn test_factory_rejects_bad_http_url() {
        let config = Config {
            http_url: "::not a url::".to_string(),
            ..Config::default()
        };
        let result = BackendFactory::new(&config).create(BackendKind::Http).await;
        assert!(matches!(result, Err(crate::error::AppError::Config(_))));
    }
}
