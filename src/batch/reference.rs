//! Content-id allocation and `$<n>` references between changeset sub-requests
//!
//! Content-ids are scoped to one changeset, start at 1, and are never reused.
//! A sub-request may target the not-yet-existing result of an earlier sibling
//! by using `$<n>` (optionally followed by a path, e.g. `$1/Orders`) as its URI.
//! The reference is transmitted verbatim; the server resolves it.

use crate::error::{BatchError, Result};

/// URI referencing the result of the sub-request with `content_id`
pub fn reference_to(content_id: u32) -> String {
    format!("${}", content_id)
}

/// Content-id referenced by a `$<n>` or `$<n>/path` URI
pub fn parse_reference(uri: &str) -> Option<u32> {
    let rest = uri.strip_prefix('$')?;
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    match rest[digits_end..].chars().next() {
        None | Some('/') => rest[..digits_end].parse().ok(),
        Some(_) => None,
    }
}

/// Per-changeset content-id counter
#[derive(Debug, Clone, Default)]
pub struct ContentIdAllocator {
    last: u32,
}

impl ContentIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id
    pub fn allocate(&mut self) -> u32 {
        self.last += 1;
        self.last
    }

    /// Most recently allocated id
    pub fn last(&self) -> Option<u32> {
        (self.last > 0).then_some(self.last)
    }

    /// Reject `$<n>` URIs that point at an id this changeset has not handed out yet
    pub fn check_reference(&self, uri: &str) -> Result<()> {
        match parse_reference(uri) {
            Some(id) if id == 0 || id > self.last => Err(BatchError::invalid_request(format!(
                "reference {} does not name an earlier request in this changeset",
                uri
            ))),
            _ => Ok(()),
        }
    }
}
