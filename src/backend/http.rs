//! HTTP-fronted cache service client
//!
//! `POST {base}/set` with a JSON body and `GET {base}/get?key=...`. Any non-2xx
//! status is a remote failure; the status body is not inspected.

use crate::{
    backend::{Ack, CacheBackend},
    error::{AppError, Result},
    types::BackendKind,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use std::time::Duration;

/// Body of a `/set` request
#[derive(Debug, Serialize)]
struct SetRequest<'a> {
    key: &'a str,
    value: &'a str,
    ttl: u64,
}

/// Cache client for the JSON-over-HTTP cache service
pub struct HttpCacheClient {
    client: Client,
    set_url: Url,
    get_url: Url,
}

impl HttpCacheClient {
    /// Build a client rooted at `base_url`; the underlying connection pool is shared by all calls
    pub fn new(base_url: &str, connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| AppError::config(format!("Invalid HTTP cache URL '{}': {}", base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::config(format!(
                "HTTP cache URL must use http or https, got '{}'",
                base.scheme()
            )));
        }

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            set_url: join(&base, "set")?,
            get_url: join(&base, "get")?,
        })
    }
}

/// Append a path segment without discarding any path already on the base
fn join(base: &Url, segment: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AppError::config(format!("HTTP cache URL '{}' cannot be a base", base)))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

/// Interpret a successful `/get` body
///
/// A JSON object with a `value` field is a hit carrying that value; a JSON
/// object with an `error` field, or an empty body, is a miss. Anything else is
/// the value verbatim.
pub fn interpret_get_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(value) = map.get("value") {
            return match value {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            };
        }
        if map.contains_key("error") {
            return None;
        }
    }

    Some(body.to_string())
}

fn check_status(status: StatusCode, op: &str) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(AppError::remote(format!("HTTP cache {} returned status {}", op, status)))
    }
}

#[async_trait]
impl CacheBackend for HttpCacheClient {
    fn name(&self) -> &str {
        BackendKind::Http.display_name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Http
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.get_url.clone())
            .query(&[("key", key)])
            .send()
            .await?;
        check_status(response.status(), "get")?;
        let body = response.text().await?;
        Ok(interpret_get_body(&body))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<Ack> {
        let body = SetRequest {
            key,
            value,
            ttl: ttl.as_secs(),
        };
        let response = self.client.post(self.set_url.clone()).json(&body).send().await?;
        check_status(response.status(), "set")?;
        Ok(Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer) -> HttpCacheClient {
        HttpCacheClient::new(&server.uri(), Duration::from_secs(2), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_get_body_interpretation() {
        assert_eq!(interpret_get_body(r#"{"key":"k","value":"v"}"#), Some("v".to_string()));
        assert_eq!(interpret_get_body(r#"{"error":"Key not found"}"#), None);
        assert_eq!(interpret_get_body(""), None);
        assert_eq!(interpret_get_body("plain text"), Some("plain text".to_string()));
        assert_eq!(interpret_get_body(r#"{"value":42}"#), Some("42".to_string()));
    }

    #[test]
    fn test_invalid_base_urls() {
        let t = Duration::from_secs(1);
        assert!(matches!(HttpCacheClient::new("not a url", t, t), Err(AppError::Config(_))));
        assert!(matches!(HttpCacheClient::new("ftp://cache", t, t), Err(AppError::Config(_))));
    }

    #[test]
    fn test_base_path_is_preserved() {
        let t = Duration::from_secs(1);
        let client = HttpCacheClient::new("http://cache.local/api/", t, t).unwrap();
        assert_eq!(client.set_url.as_str(), "http://cache.local/api/set");
        assert_eq!(client.get_url.as_str(), "http://cache.local/api/get");
    }

    #[tokio::test]
    async fn test_set_posts_json_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/set"))
            .and(body_json(serde_json::json!({"key": "weathers", "value": "sunny-25", "ttl": 60})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.set_default("weathers", "sunny-25").await.unwrap(), Ack);
    }

    #[tokio::test]
    async fn test_get_hit_and_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .and(query_param("key", "weathers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"key": "weathers", "value": "sunny-25"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .and(query_param("key", "absent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "Key not found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.get("weathers").await.unwrap(), Some("sunny-25".to_string()));
        assert_eq!(client.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/set"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(client.set_default("k", "v").await, Err(AppError::Remote(_))));
        assert!(matches!(client.get("k").await, Err(AppError::Remote(_))));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client =
            HttpCacheClient::new(&server.uri(), Duration::from_secs(1), Duration::from_millis(100)).unwrap();
        assert!(matches!(client.get("k").await, Err(AppError::Timeout(_))));
    }
}
