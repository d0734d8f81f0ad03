//! reqwest-backed transport

use super::{BatchTransport, TransportRequest, TransportResponse};
use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Body, Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Sends batches over HTTP with a pooled [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client using the timeout and user agent from `config`
    pub fn new(config: &BatchConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .timeout(config.timeout())
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .tcp_nodelay(true)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BatchTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        debug!("POST {}", request.url);

        let response = self
            .client
            .post(request.url)
            .headers(request.headers)
            .body(Body::wrap_stream(request.body))
            .send()
            .await
            .map_err(|e| {
                warn!("Batch request failed: {}", e);
                BatchError::HttpClient(e)
            })?;

        let status = response.status();
        let status_message = status.canonical_reason().unwrap_or_default().to_string();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(BatchError::HttpClient))
            .boxed();

        Ok(TransportResponse {
            status,
            status_message,
            headers,
            body,
        })
    }
}
