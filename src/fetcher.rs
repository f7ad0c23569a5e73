//! Remote fetcher: a single HTTP GET returning the response body.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::{AssetError, Result};

/// Source of remote payloads.
///
/// The caches only ever call `get`, so tests can swap in an in-memory fake.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Fetch the full body at `url`. Non-2xx answers are errors.
    async fn get(&self, url: &str) -> Result<Bytes>;
}

/// `RemoteFetcher` backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssetError::Network {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Bytes> {
        let network = |e: reqwest::Error| AssetError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        tracing::debug!(%url, "GET");
        let response = self.client.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(network)?;
        tracing::debug!(%url, bytes = body.len(), "GET complete");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/war/deck1");
            then.status(200).body("payload");
        });

        let body = fetcher().get(&server.url("/war/deck1")).await.unwrap();

        assert_eq!(&body[..], b"payload");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let url = server.url("/missing");
        let err = fetcher().get(&url).await.unwrap_err();

        assert_eq!(err, AssetError::Http { url, status: 404 });
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        // Grab a free port, then close it so the connection is refused
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let err = fetcher().get(&format!("http://127.0.0.1:{port}/x")).await.unwrap_err();
        assert!(matches!(err, AssetError::Network { .. }));
    }
}
