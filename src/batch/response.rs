//! Response-side model: one typed item per sent batch item
//!
//! Bodies are kept as the raw bytes that arrived on the wire. Nothing is
//! decoded until the caller asks for it through [`ODataResponse::body_text`]
//! or [`ODataResponse::body_json`].

use super::item::{ItemShape, SubRequestShape};
use super::parser::{BatchResponseItems, EmbeddedResponse, MultipartReader};
use crate::error::{BatchError, Result};
use crate::request::RequestKind;
use crate::request::headers::{CHANGESET_CONTENT_ID_NAME, boundary_from_content_type};
use crate::transport::TransportResponse;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Rejected batch bodies are kept for diagnostics up to this many bytes
const MAX_REJECTED_BODY: usize = 64 * 1024;

/// One embedded HTTP response
#[derive(Debug, Clone)]
pub struct ODataResponse {
    status: StatusCode,
    message: String,
    headers: HeaderMap,
    content_id: Option<u32>,
    kind: RequestKind,
    body: Bytes,
}

impl ODataResponse {
    pub(crate) fn from_embedded(
        embedded: EmbeddedResponse,
        kind: RequestKind,
        content_id: Option<u32>,
    ) -> Self {
        Self {
            status: embedded.status,
            message: embedded.message,
            headers: embedded.headers,
            content_id,
            kind,
            body: embedded.body,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase as sent by the server
    pub fn status_message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Content-id of the originating changeset sub-request
    pub fn content_id(&self) -> Option<u32> {
        self.content_id
    }

    /// Kind of the request this response answers
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Raw body bytes, undecoded
    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Decode the body as UTF-8 text
    pub fn body_text(&self) -> Result<String> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    /// Decode the body as JSON
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turn a 4xx/5xx status into [`BatchError::SubRequestFailure`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_client_error() || self.status.is_server_error() {
            return Err(BatchError::SubRequestFailure {
                status: self.status.as_u16(),
                message: self.message,
                content_id: self.content_id,
            });
        }
        Ok(self)
    }
}

/// Response to a retrieve item
#[derive(Debug, Clone)]
pub struct RetrieveResponseItem {
    response: ODataResponse,
}

impl RetrieveResponseItem {
    pub(crate) fn new(response: ODataResponse) -> Self {
        Self { response }
    }

    pub fn response(&self) -> &ODataResponse {
        &self.response
    }

    pub fn into_response(self) -> ODataResponse {
        self.response
    }
}

/// Response to an outside update item
#[derive(Debug, Clone)]
pub struct OutsideUpdateResponseItem {
    response: ODataResponse,
}

impl OutsideUpdateResponseItem {
    pub(crate) fn new(response: ODataResponse) -> Self {
        Self { response }
    }

    pub fn response(&self) -> &ODataResponse {
        &self.response
    }

    pub fn into_response(self) -> ODataResponse {
        self.response
    }
}

/// Responses to one changeset, in sub-request order
///
/// A forward-only cursor. When the server stopped the changeset at a failure,
/// fewer responses than sub-requests are yielded; the sub-requests that were
/// not answered must be treated as not applied.
#[derive(Debug, Clone)]
pub struct ChangesetResponseItem {
    requests: Vec<SubRequestShape>,
    answered: Vec<(Option<u32>, StatusCode)>,
    responses: VecDeque<ODataResponse>,
}

impl ChangesetResponseItem {
    pub(crate) fn new(requests: Vec<SubRequestShape>, responses: Vec<ODataResponse>) -> Self {
        Self {
            answered: responses.iter().map(|r| (r.content_id, r.status)).collect(),
            requests,
            responses: responses.into(),
        }
    }

    /// Number of sub-requests sent in this changeset
    pub fn requested(&self) -> usize {
        self.requests.len()
    }

    /// Number of responses the server sent back
    pub fn received(&self) -> usize {
        self.answered.len()
    }

    /// Responses not yet taken from the cursor
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }

    /// Whether the server answered fewer sub-requests than were sent
    pub fn is_aborted(&self) -> bool {
        self.received() < self.requested()
    }

    /// Peek at the next response without advancing
    pub fn peek(&self) -> Option<&ODataResponse> {
        self.responses.front()
    }

    /// Content-ids of sub-requests that got no response
    pub fn unapplied_content_ids(&self) -> Vec<u32> {
        if !self.is_aborted() {
            return Vec::new();
        }

        let answered: Vec<u32> = if self.answered.iter().all(|(id, _)| id.is_some()) {
            self.answered.iter().filter_map(|(id, _)| *id).collect()
        } else {
            self.requests
                .iter()
                .take(self.received())
                .map(|r| r.content_id)
                .collect()
        };

        self.requests
            .iter()
            .map(|r| r.content_id)
            .filter(|id| !answered.contains(id))
            .collect()
    }

    /// Fail with [`BatchError::ChangesetAborted`] when the changeset was cut short
    pub fn ensure_complete(&self) -> Result<()> {
        if !self.is_aborted() {
            return Ok(());
        }

        Err(BatchError::ChangesetAborted {
            requested: self.requested(),
            executed: self.received(),
            failed_content_id: self.failed_content_id(),
            status: self.failure_status(),
        })
    }

    fn failed_content_id(&self) -> Option<u32> {
        // The failing response is the last one the server sent.
        let index = self.received().checked_sub(1)?;
        self.answered[index]
            .0
            .or_else(|| self.requests.get(index).map(|r| r.content_id))
    }

    fn failure_status(&self) -> Option<u16> {
        self.answered
            .last()
            .filter(|(_, status)| !status.is_success())
            .map(|(_, status)| status.as_u16())
    }
}

impl Iterator for ChangesetResponseItem {
    type Item = ODataResponse;

    fn next(&mut self) -> Option<Self::Item> {
        self.responses.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.responses.len(), Some(self.responses.len()))
    }
}

impl ExactSizeIterator for ChangesetResponseItem {}

/// One top-level response item, mirroring the sent [`BatchItem`](super::BatchItem)
#[derive(Debug, Clone)]
pub enum BatchResponseItem {
    Retrieve(RetrieveResponseItem),
    Changeset(ChangesetResponseItem),
    OutsideUpdate(OutsideUpdateResponseItem),
}

impl BatchResponseItem {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BatchResponseItem::Retrieve(_) => "retrieve",
            BatchResponseItem::Changeset(_) => "changeset",
            BatchResponseItem::OutsideUpdate(_) => "outside_update",
        }
    }

    /// The single response of a retrieve or outside update item
    pub fn single(&self) -> Option<&ODataResponse> {
        match self {
            BatchResponseItem::Retrieve(item) => Some(item.response()),
            BatchResponseItem::OutsideUpdate(item) => Some(item.response()),
            BatchResponseItem::Changeset(_) => None,
        }
    }

    pub fn into_changeset(self) -> Option<ChangesetResponseItem> {
        match self {
            BatchResponseItem::Changeset(item) => Some(item),
            _ => None,
        }
    }
}

/// Result of executing a batch
///
/// The top-level status describes the `$batch` exchange only. Sub-request
/// outcomes are on the individual items yielded by [`body`](Self::body).
#[derive(Debug)]
pub struct BatchResponse {
    status: StatusCode,
    message: String,
    headers: HeaderMap,
    items: BatchResponseItems,
}

impl BatchResponse {
    /// Build the response from what the transport returned for the sent items
    pub(crate) async fn from_transport(
        response: TransportResponse,
        shapes: Vec<ItemShape>,
    ) -> Result<Self> {
        let TransportResponse {
            status,
            status_message,
            headers,
            mut body,
        } = response;

        info!("Batch response received: {} {}", status.as_u16(), status_message);

        if !status.is_success() {
            let mut text = Vec::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                let room = MAX_REJECTED_BODY.saturating_sub(text.len());
                text.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if room <= chunk.len() {
                    break;
                }
            }
            return Err(BatchError::BatchRejected {
                status: status.as_u16(),
                message: status_message,
                body: String::from_utf8_lossy(&text).into_owned(),
            });
        }

        let boundary = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_from_content_type);

        let items = match boundary {
            Some(boundary) => {
                debug!("Parsing batch response with boundary {}", boundary);
                BatchResponseItems::new(MultipartReader::new(body, &boundary), shapes)
            }
            None if shapes.is_empty() => BatchResponseItems::empty(),
            None => {
                return Err(BatchError::malformed(format!(
                    "response Content-Type {:?} carries no multipart boundary",
                    headers.get(CONTENT_TYPE)
                )));
            }
        };

        Ok(Self {
            status,
            message: status_message,
            headers,
            items,
        })
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn status_message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Cursor over the response items, in the order the items were appended
    pub fn body(&mut self) -> &mut BatchResponseItems {
        &mut self.items
    }

    pub fn into_body(self) -> BatchResponseItems {
        self.items
    }
}

/// Content-id of a changeset sub-response, from the part or the embedded message
pub(crate) fn content_id_from(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(CHANGESET_CONTENT_ID_NAME)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
