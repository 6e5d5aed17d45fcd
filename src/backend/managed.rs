//! Managed distributed cache (Redis) used as an opaque get/set service

use crate::{
    backend::{Ack, CacheBackend},
    error::{AppError, Result},
    types::BackendKind,
};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::Duration;
use tokio::time::timeout;

/// Redis-backed cache client
///
/// The connection manager multiplexes one connection and reconnects on its
/// own; each call works on a cheap clone of it.
pub struct ManagedCacheClient {
    manager: ConnectionManager,
    instance: Option<String>,
}

impl ManagedCacheClient {
    /// Connect to `url`; keys are prefixed with `instance` when one is given
    pub async fn connect(url: &str, instance: Option<String>, connect_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::config(format!("Invalid Redis URL '{}': {}", url, e)))?;

        let manager = timeout(connect_timeout, client.get_connection_manager())
            .await
            .map_err(|_| AppError::timeout(format!("connect to {} exceeded {:?}", url, connect_timeout)))??;

        Ok(Self {
            manager,
            instance: instance.filter(|name| !name.is_empty()),
        })
    }

    /// Key as stored on the server
    pub fn storage_key(&self, key: &str) -> String {
        prefixed_key(self.instance.as_deref(), key)
    }
}

fn prefixed_key(instance: Option<&str>, key: &str) -> String {
    match instance {
        Some(prefix) => format!("{}{}", prefix, key),
        None => key.to_string(),
    }
}

#[async_trait]
impl CacheBackend for ManagedCacheClient {
    fn name(&self) -> &str {
        BackendKind::Redis.display_name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(self.storage_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<Ack> {
        // EX 0 is rejected by the server
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(self.storage_key(key), value, seconds).await?;
        Ok(Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefixing() {
        assert_eq!(prefixed_key(Some("test"), "weathers"), "testweathers");
        assert_eq!(prefixed_key(None, "weathers"), "weathers");
    }

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let result = ManagedCacheClient::connect("not-a-redis-url", None, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_to_connect() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("redis://127.0.0.1:{}", port);
        let result = ManagedCacheClient::connect(&url, Some("test".into()), Duration::from_millis(500)).await;
        assert!(matches!(result, Err(AppError::Connect(_)) | Err(AppError::Timeout(_))));
    }
}
