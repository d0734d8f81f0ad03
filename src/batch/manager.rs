//! Batch stream manager
//!
//! Collects items in call order, then encodes and sends them exactly once.
//! Encoding runs on its own task and feeds the transport through a bounded
//! content channel, so the request body is never held in memory as a whole.

use super::encoder::MultipartEncoder;
use super::item::{BatchItem, ChangesetItem, ItemShape, OutsideUpdateItem, RetrieveItem};
use super::response::BatchResponse;
use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use crate::request::headers::{CONTINUE_ON_ERROR, PREFER, multipart_content_type};
use crate::stream::{ContentSink, content_channel};
use crate::transport::{BatchTransport, TransportRequest};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::io;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
enum ManagerState {
    Open,
    Sent(Box<BatchResponse>),
    Failed(String),
}

/// Orchestrates one `$batch` exchange
pub struct BatchStreamManager {
    endpoint: Url,
    config: BatchConfig,
    transport: Arc<dyn BatchTransport>,
    encoder: MultipartEncoder,
    headers: HeaderMap,
    items: Arc<Vec<BatchItem>>,
    state: ManagerState,
}

impl std::fmt::Debug for BatchStreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchStreamManager")
            .field("endpoint", &self.endpoint.as_str())
            .field("boundary", &self.encoder.boundary())
            .field("items", &self.items.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl BatchStreamManager {
    /// Create a manager posting to `endpoint` (the service's `$batch` URL)
    pub fn new(endpoint: Url, config: BatchConfig, transport: Arc<dyn BatchTransport>) -> Self {
        Self {
            endpoint,
            config,
            transport,
            encoder: MultipartEncoder::new(MultipartEncoder::generate_boundary()),
            headers: HeaderMap::new(),
            items: Arc::new(Vec::new()),
            state: ManagerState::Open,
        }
    }

    /// Use a fixed outer boundary instead of a random one
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.encoder = MultipartEncoder::new(boundary);
        self
    }

    /// Append a retrieve item and return it for population
    pub fn add_retrieve(&mut self) -> Result<&mut RetrieveItem> {
        match self.push(BatchItem::Retrieve(RetrieveItem::default()))? {
            BatchItem::Retrieve(item) => Ok(item),
            _ => Err(BatchError::internal("appended item changed kind")),
        }
    }

    /// Append an empty changeset and return it for population
    pub fn add_changeset(&mut self) -> Result<&mut ChangesetItem> {
        match self.push(BatchItem::Changeset(ChangesetItem::new()))? {
            BatchItem::Changeset(item) => Ok(item),
            _ => Err(BatchError::internal("appended item changed kind")),
        }
    }

    /// Append an outside update item and return it for population
    pub fn add_outside_update(&mut self) -> Result<&mut OutsideUpdateItem> {
        match self.push(BatchItem::OutsideUpdate(OutsideUpdateItem::default()))? {
            BatchItem::OutsideUpdate(item) => Ok(item),
            _ => Err(BatchError::internal("appended item changed kind")),
        }
    }

    fn push(&mut self, item: BatchItem) -> Result<&mut BatchItem> {
        self.ensure_open("add an item")?;
        // Items are only shared with the encoder after sending.
        let items = Arc::make_mut(&mut self.items);
        items.push(item);
        items
            .last_mut()
            .ok_or_else(|| BatchError::internal("item list empty after push"))
    }

    /// Add a header to the `$batch` request
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.ensure_open("add a header")?;
        let name = header_name(name)?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Ask the server to keep processing after a failed sub-request
    pub fn set_continue_on_error(&mut self, continue_on_error: bool) -> Result<()> {
        self.ensure_open("change the error policy")?;
        self.config.continue_on_error = continue_on_error;
        Ok(())
    }

    pub fn continue_on_error(&self) -> bool {
        self.config.continue_on_error
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn boundary(&self) -> &str {
        self.encoder.boundary()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Whether the batch has been sent (successfully or not)
    pub fn is_sent(&self) -> bool {
        !matches!(self.state, ManagerState::Open)
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        match &self.state {
            ManagerState::Open => Ok(()),
            _ => Err(BatchError::sequence(format!(
                "cannot {} after the batch has been sent",
                action
            ))),
        }
    }

    /// Encode and send the batch, once
    ///
    /// Later calls return the response cached by the first one. If the items
    /// fail validation nothing is sent and the batch stays open.
    pub async fn execute(&mut self) -> Result<&mut BatchResponse> {
        if let ManagerState::Open = self.state {
            for (position, item) in self.items.iter().enumerate() {
                item.validate(position)?;
            }

            match self.send().await {
                Ok(response) => self.state = ManagerState::Sent(Box::new(response)),
                Err(e) => {
                    self.state = ManagerState::Failed(e.to_string());
                    return Err(e);
                }
            }
        }

        match &mut self.state {
            ManagerState::Sent(response) => Ok(response.as_mut()),
            ManagerState::Failed(reason) => Err(BatchError::sequence(format!(
                "batch was already sent and failed: {}",
                reason
            ))),
            ManagerState::Open => Err(BatchError::internal("batch still open after execute")),
        }
    }

    /// Same as [`execute`](Self::execute)
    pub async fn get_response(&mut self) -> Result<&mut BatchResponse> {
        self.execute().await
    }

    /// Execute if needed and take ownership of the response
    pub async fn into_response(mut self) -> Result<BatchResponse> {
        self.execute().await?;
        match std::mem::replace(
            &mut self.state,
            ManagerState::Failed("response already taken".to_string()),
        ) {
            ManagerState::Sent(response) => Ok(*response),
            _ => Err(BatchError::internal("batch not sent after execute")),
        }
    }

    async fn send(&self) -> Result<BatchResponse> {
        let shapes: Vec<ItemShape> = self.items.iter().map(BatchItem::shape).collect();
        let headers = self.batch_headers()?;

        info!(
            "Executing batch with {} items to {} (boundary {})",
            self.items.len(),
            self.endpoint,
            self.encoder.boundary()
        );

        let (sink, source) = content_channel(self.config.stream_buffer_chunks);
        let task = EncodeTask::spawn(self.encoder.clone(), self.items.clone(), sink);

        let request = TransportRequest {
            url: self.endpoint.clone(),
            headers,
            body: source,
        };

        let sent = self.transport.send(request).await;
        let encoded = task.join().await;

        let response = match (sent, encoded) {
            (_, Err(e)) if !e.is_transport() => return Err(e),
            (Err(e), _) => return Err(e),
            (Ok(response), Err(e)) => {
                warn!("Transport answered before the request body was consumed: {}", e);
                response
            }
            (Ok(response), Ok(bytes)) => {
                debug!("Batch body sent: {} bytes", bytes);
                response
            }
        };

        BatchResponse::from_transport(response, shapes).await
    }

    fn batch_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let version = self.config.service_version;

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&multipart_content_type(self.encoder.boundary()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_str(&self.config.accept)?);
        headers.insert(
            header_name(version.version_header())?,
            HeaderValue::from_static(version.as_str()),
        );
        headers.insert(
            header_name(version.max_version_header())?,
            HeaderValue::from_static(version.as_str()),
        );
        if self.config.continue_on_error {
            headers.insert(
                header_name(PREFER)?,
                HeaderValue::from_static(CONTINUE_ON_ERROR),
            );
        }

        for (name, value) in &self.config.default_headers {
            headers.insert(
                header_name(name)?,
                HeaderValue::from_str(value)?,
            );
        }
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }

        Ok(headers)
    }
}

/// Parse a header name, lower-casing it
fn header_name(name: &str) -> Result<HeaderName> {
    Ok(HeaderName::from_bytes(name.as_bytes())?)
}

/// Encoder task, aborted if the exchange is dropped before it finishes
struct EncodeTask(JoinHandle<Result<u64>>);

impl EncodeTask {
    fn spawn(encoder: MultipartEncoder, items: Arc<Vec<BatchItem>>, mut sink: ContentSink) -> Self {
        Self(tokio::spawn(async move {
            match encoder.encode(&items, &mut sink).await {
                Ok(written) => {
                    sink.finish();
                    Ok(written)
                }
                Err(e) => {
                    sink.abort(io::Error::other(e.to_string())).await;
                    Err(e)
                }
            }
        }))
    }

    async fn join(mut self) -> Result<u64> {
        (&mut self.0).await?
    }
}

impl Drop for EncodeTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}
