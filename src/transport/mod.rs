//! Transport seam between the batch engine and the network
//!
//! The engine hands a transport a streamed request body and gets back a
//! streamed response body. [`ReqwestTransport`] is the HTTP implementation;
//! tests plug in their own.

mod http_client;

pub use http_client::ReqwestTransport;

use crate::error::Result;
use crate::stream::ContentSource;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use url::Url;

/// One outgoing `$batch` request
#[derive(Debug)]
pub struct TransportRequest {
    pub url: Url,
    pub headers: HeaderMap,
    /// Body as it is being encoded
    pub body: ContentSource,
}

/// The `$batch` response, available once status and headers have arrived
pub struct TransportResponse {
    pub status: StatusCode,
    pub status_message: String,
    pub headers: HeaderMap,
    /// Body, pulled on demand by the response parser
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("status_message", &self.status_message)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends one batch body and returns the response head plus a body stream
///
/// Implementations must not retry; failures are reported as
/// transport errors and left to the caller.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}
