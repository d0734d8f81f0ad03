//! Custom test assertions

use odata_batch::{BatchResponseItem, ChangesetResponseItem, ODataResponse};

/// Assertions for top-level response items
pub trait ResponseItemAssertions {
    /// Assert the item answers a single request with `status`, and return that response
    fn assert_single(&self, status: u16) -> &ODataResponse;

    /// Assert the item is a changeset and return it
    fn assert_changeset(self) -> ChangesetResponseItem;
}

impl ResponseItemAssertions for BatchResponseItem {
    fn assert_single(&self, status: u16) -> &ODataResponse {
        let response = self
            .single()
            .unwrap_or_else(|| panic!("Expected a single response, got {}", self.kind_name()));
        assert_eq!(
            response.status_code(),
            status,
            "Unexpected status for {} item: {}",
            self.kind_name(),
            response.status_message()
        );
        response
    }

    fn assert_changeset(self) -> ChangesetResponseItem {
        let kind = self.kind_name();
        self.into_changeset()
            .unwrap_or_else(|| panic!("Expected a changeset, got {}", kind))
    }
}

/// Statuses of the remaining changeset responses, in order
pub fn changeset_statuses(changeset: ChangesetResponseItem) -> Vec<u16> {
    changeset.map(|r| r.status_code()).collect()
}
