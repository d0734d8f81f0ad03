//! Lazy cursor over top-level batch response items
//!
//! Each call to [`BatchResponseItems::next`] pulls exactly one top-level
//! segment from the transport and correlates it with the request item sent at
//! the same position.

use super::http::parse_http_response;
use super::multipart::{MultipartPart, MultipartReader, split_multipart};
use crate::batch::item::{ItemShape, SubRequestShape};
use crate::batch::response::{
    BatchResponseItem, ChangesetResponseItem, ODataResponse, OutsideUpdateResponseItem,
    RetrieveResponseItem, content_id_from,
};
use crate::error::{BatchError, Result};
use crate::request::RequestKind;
use futures::Stream;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Forward-only, single-pass sequence of response items
#[derive(Debug)]
pub struct BatchResponseItems {
    reader: MultipartReader,
    shapes: VecDeque<ItemShape>,
    peeked: Option<MultipartPart>,
    position: usize,
    failed: bool,
}

impl BatchResponseItems {
    pub(crate) fn new(reader: MultipartReader, shapes: Vec<ItemShape>) -> Self {
        Self {
            reader,
            shapes: shapes.into(),
            peeked: None,
            position: 0,
            failed: false,
        }
    }

    /// A cursor with no items
    pub fn empty() -> Self {
        Self::new(MultipartReader::empty(), Vec::new())
    }

    /// Number of items yielded so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Sent items that have not been matched with a response yet
    pub fn unanswered(&self) -> usize {
        self.shapes.len()
    }

    /// Whether another segment remains before the closing delimiter
    pub async fn has_next(&mut self) -> Result<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        self.peeked = self.read_part().await?;
        Ok(self.peeked.is_some())
    }

    /// Parse and return the next item
    pub async fn next(&mut self) -> Result<Option<BatchResponseItem>> {
        let part = match self.peeked.take() {
            Some(part) => part,
            None => match self.read_part().await? {
                Some(part) => part,
                None => {
                    if !self.shapes.is_empty() {
                        warn!(
                            "Batch response ended after {} items; {} sent items got no response",
                            self.position,
                            self.shapes.len()
                        );
                    }
                    return Ok(None);
                }
            },
        };

        let item = self.correlate(part).inspect_err(|_| self.failed = true)?;
        self.position += 1;
        Ok(Some(item))
    }

    /// Consume the cursor as a stream of items
    pub fn into_stream(self) -> impl Stream<Item = Result<BatchResponseItem>> + Send {
        async_stream::stream! {
            let mut items = self;
            loop {
                match items.next().await {
                    Ok(Some(item)) => yield Ok(item),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }

    async fn read_part(&mut self) -> Result<Option<MultipartPart>> {
        if self.failed {
            return Err(BatchError::malformed(
                "response cursor already failed on an earlier segment",
            ));
        }
        let part = self
            .reader
            .next_part()
            .await
            .inspect_err(|_| self.failed = true)?;

        // A server answers at least the first item of a non-empty batch.
        if part.is_none() && self.position == 0 && !self.shapes.is_empty() {
            self.failed = true;
            return Err(BatchError::malformed(format!(
                "batch response has no segments for {} sent items",
                self.shapes.len()
            )));
        }
        Ok(part)
    }

    fn correlate(&mut self, part: MultipartPart) -> Result<BatchResponseItem> {
        let position = self.position;
        let shape = self.shapes.pop_front().ok_or_else(|| {
            BatchError::malformed(format!(
                "response segment {} has no matching request item",
                position
            ))
        })?;

        let item = match shape {
            ItemShape::Retrieve => BatchResponseItem::Retrieve(RetrieveResponseItem::new(
                single_response(&part, position, RequestKind::Retrieve)?,
            )),
            ItemShape::OutsideUpdate(kind) => BatchResponseItem::OutsideUpdate(
                OutsideUpdateResponseItem::new(single_response(&part, position, kind)?),
            ),
            ItemShape::Changeset(requests) => {
                BatchResponseItem::Changeset(changeset_response(&part, position, requests)?)
            }
        };

        debug!("Parsed batch response item {} ({})", position, item.kind_name());
        Ok(item)
    }
}

fn single_response(part: &MultipartPart, position: usize, kind: RequestKind) -> Result<ODataResponse> {
    if part.is_multipart() {
        return Err(BatchError::malformed(format!(
            "segment {} is a changeset but a single request was sent at that position",
            position
        )));
    }

    let embedded = parse_http_response(&part.body)?;
    let content_id = part.content_id().or_else(|| content_id_from(&embedded.headers));
    Ok(ODataResponse::from_embedded(embedded, kind, content_id))
}

fn changeset_response(
    part: &MultipartPart,
    position: usize,
    requests: Vec<SubRequestShape>,
) -> Result<ChangesetResponseItem> {
    // Some servers answer an aborted changeset with a bare application/http part.
    if !part.is_multipart() {
        let embedded = parse_http_response(&part.body)?;
        let content_id = part
            .content_id()
            .or_else(|| content_id_from(&embedded.headers))
            .or_else(|| (requests.len() == 1).then(|| requests[0].content_id));
        let kind = kind_for(&requests, content_id, 0);
        debug!(
            "Changeset {} answered with a single {} response",
            position, embedded.status
        );
        let response = ODataResponse::from_embedded(embedded, kind, content_id);
        return Ok(ChangesetResponseItem::new(requests, vec![response]));
    }

    let boundary = part.nested_boundary().ok_or_else(|| {
        BatchError::malformed(format!("changeset segment {} has no boundary", position))
    })?;
    let inner = split_multipart(&part.body, &boundary)?;

    if inner.is_empty() {
        return Err(BatchError::malformed(format!(
            "changeset {} has no responses",
            position
        )));
    }
    if inner.len() > requests.len() {
        return Err(BatchError::malformed(format!(
            "changeset {} returned {} responses for {} requests",
            position,
            inner.len(),
            requests.len()
        )));
    }

    let positional = inner.len() == requests.len();
    let mut responses = Vec::with_capacity(inner.len());
    for (index, sub) in inner.iter().enumerate() {
        if sub.is_multipart() {
            return Err(BatchError::malformed(format!(
                "changeset {} contains a nested multipart segment",
                position
            )));
        }

        let embedded = parse_http_response(&sub.body)?;
        let content_id = sub
            .content_id()
            .or_else(|| content_id_from(&embedded.headers))
            .or_else(|| positional.then(|| requests[index].content_id));
        let kind = kind_for(&requests, content_id, index);
        responses.push(ODataResponse::from_embedded(embedded, kind, content_id));
    }

    let item = ChangesetResponseItem::new(requests, responses);
    if item.is_aborted() {
        warn!(
            "Changeset {} aborted: {} of {} requests answered",
            position,
            item.received(),
            item.requested()
        );
    }
    Ok(item)
}

fn kind_for(requests: &[SubRequestShape], content_id: Option<u32>, index: usize) -> RequestKind {
    content_id
        .and_then(|id| requests.iter().find(|r| r.content_id == id))
        .or_else(|| requests.get(index))
        .map(|r| r.kind)
        .unwrap_or(RequestKind::Update)
}
