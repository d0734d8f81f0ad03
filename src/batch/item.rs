//! Items appended to a batch

use super::reference::{ContentIdAllocator, reference_to};
use crate::error::{BatchError, Result};
use crate::request::{ODataRequest, RequestKind};
use uuid::Uuid;

/// A single read
#[derive(Debug, Clone, Default)]
pub struct RetrieveItem {
    request: Option<ODataRequest>,
}

impl RetrieveItem {
    /// Set the wrapped read request
    pub fn set_request(&mut self, request: ODataRequest) -> Result<()> {
        if request.kind() != RequestKind::Retrieve {
            return Err(BatchError::invalid_request(format!(
                "retrieve items only carry reads, got {:?} {}",
                request.kind(),
                request.uri()
            )));
        }
        request.validate()?;
        self.request = Some(request);
        Ok(())
    }

    pub fn request(&self) -> Option<&ODataRequest> {
        self.request.as_ref()
    }
}

/// A write committed on its own, outside any changeset
#[derive(Debug, Clone, Default)]
pub struct OutsideUpdateItem {
    request: Option<ODataRequest>,
}

impl OutsideUpdateItem {
    /// Set the wrapped write request
    pub fn set_request(&mut self, request: ODataRequest) -> Result<()> {
        if !request.kind().is_write() {
            return Err(BatchError::invalid_request(format!(
                "outside updates only carry writes, got a read of {}",
                request.uri()
            )));
        }
        request.validate()?;
        self.request = Some(request);
        Ok(())
    }

    pub fn request(&self) -> Option<&ODataRequest> {
        self.request.as_ref()
    }
}

/// An atomic group of writes
///
/// Each appended request gets the next content-id, starting at 1.
#[derive(Debug, Clone)]
pub struct ChangesetItem {
    boundary: String,
    requests: Vec<(u32, ODataRequest)>,
    content_ids: ContentIdAllocator,
}

impl Default for ChangesetItem {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangesetItem {
    pub fn new() -> Self {
        Self::with_boundary(format!("changeset_{}", Uuid::new_v4()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            requests: Vec::new(),
            content_ids: ContentIdAllocator::new(),
        }
    }

    /// Append a write and return the content-id assigned to it
    pub fn add_request(&mut self, request: ODataRequest) -> Result<u32> {
        if !request.kind().is_write() {
            return Err(BatchError::invalid_request(format!(
                "changesets only carry writes, got a read of {}",
                request.uri()
            )));
        }
        request.validate()?;
        self.content_ids.check_reference(request.uri())?;

        let content_id = self.content_ids.allocate();
        self.requests.push((content_id, request));
        Ok(content_id)
    }

    /// Content-id of the request appended last
    pub fn last_content_id(&self) -> Option<u32> {
        self.content_ids.last()
    }

    /// `$<n>` URI pointing at the request appended last
    pub fn last_reference(&self) -> Option<String> {
        self.last_content_id().map(reference_to)
    }

    pub fn requests(&self) -> impl Iterator<Item = (u32, &ODataRequest)> {
        self.requests.iter().map(|(id, request)| (*id, request))
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Unit appended to a batch
#[derive(Debug, Clone)]
pub enum BatchItem {
    Retrieve(RetrieveItem),
    Changeset(ChangesetItem),
    OutsideUpdate(OutsideUpdateItem),
}

impl BatchItem {
    /// Check the item is complete enough to be sent
    pub fn validate(&self, position: usize) -> Result<()> {
        match self {
            BatchItem::Retrieve(item) if item.request().is_none() => Err(
                BatchError::invalid_request(format!("retrieve item {} has no request", position)),
            ),
            BatchItem::OutsideUpdate(item) if item.request().is_none() => {
                Err(BatchError::invalid_request(format!(
                    "outside update item {} has no request",
                    position
                )))
            }
            BatchItem::Changeset(item) if item.is_empty() => Err(BatchError::invalid_request(
                format!("changeset item {} has no requests", position),
            )),
            _ => Ok(()),
        }
    }

    /// What the response for this item is expected to look like
    pub fn shape(&self) -> ItemShape {
        match self {
            BatchItem::Retrieve(_) => ItemShape::Retrieve,
            BatchItem::OutsideUpdate(item) => ItemShape::OutsideUpdate(
                item.request()
                    .map(ODataRequest::kind)
                    .unwrap_or(RequestKind::Update),
            ),
            BatchItem::Changeset(item) => ItemShape::Changeset(
                item.requests()
                    .map(|(content_id, request)| SubRequestShape {
                        content_id,
                        kind: request.kind(),
                    })
                    .collect(),
            ),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            BatchItem::Retrieve(_) => "retrieve",
            BatchItem::Changeset(_) => "changeset",
            BatchItem::OutsideUpdate(_) => "outside_update",
        }
    }
}

/// Request-side facts the response parser needs to correlate results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemShape {
    Retrieve,
    Changeset(Vec<SubRequestShape>),
    OutsideUpdate(RequestKind),
}

/// One changeset sub-request as seen by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRequestShape {
    pub content_id: u32,
    pub kind: RequestKind,
}
