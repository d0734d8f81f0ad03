//! Declarative batch descriptions
//!
//! A [`BatchPlan`] lists batch items in YAML so a batch can be described
//! without writing code:
//!
//! ```yaml
//! continue_on_error: false
//! items:
//!   - type: retrieve
//!     uri: Customers(1)
//!   - type: changeset
//!     requests:
//!       - kind: create
//!         uri: Orders
//!         body: { "OrderID": 1000 }
//!       - kind: update
//!         uri: $1
//!         body: { "Quantity": 2 }
//!   - type: outside_update
//!     kind: delete
//!     uri: Orders(7)
//! ```

use crate::batch::BatchStreamManager;
use crate::error::{BatchError, Result};
use crate::request::{ODataFormat, ODataRequest, RequestKind, UpdateType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Ordered description of a batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPlan {
    /// Overrides the configured continue-on-error preference
    #[serde(default)]
    pub continue_on_error: Option<bool>,
    #[serde(default)]
    pub items: Vec<PlanItem>,
}

/// One batch item in a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanItem {
    Retrieve(PlanRequest),
    Changeset { requests: Vec<PlanRequest> },
    OutsideUpdate(PlanRequest),
}

/// One sub-request in a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Defaults to `retrieve` for retrieve items and `update` elsewhere
    #[serde(default)]
    pub kind: Option<RequestKind>,
    pub uri: String,
    #[serde(default)]
    pub update_type: UpdateType,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub format: Option<ODataFormat>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl PlanRequest {
    /// Build the request, using `default_kind` when the plan names none
    pub fn to_request(&self, default_kind: RequestKind) -> Result<ODataRequest> {
        let kind = self.kind.unwrap_or(default_kind);
        let request = match kind {
            RequestKind::Retrieve => ODataRequest::retrieve(&self.uri),
            RequestKind::Create => ODataRequest::create_json(&self.uri, self.require_body(kind)?)?,
            RequestKind::Update => {
                ODataRequest::update_json(&self.uri, self.update_type, self.require_body(kind)?)?
            }
            RequestKind::Delete => ODataRequest::delete(&self.uri),
            RequestKind::Invoke => {
                let parameters = self
                    .body
                    .as_ref()
                    .map(serde_json::to_vec)
                    .transpose()?
                    .map(Into::into);
                ODataRequest::invoke(&self.uri, parameters)
            }
        };

        let mut request = match self.format {
            Some(format) => request.with_format(format),
            None => request,
        };
        for (name, value) in &self.headers {
            request = request.try_header(name, value)?;
        }
        Ok(request)
    }

    fn require_body(&self, kind: RequestKind) -> Result<&serde_json::Value> {
        self.body.as_ref().ok_or_else(|| {
            BatchError::invalid_request(format!("{:?} of {} needs a body", kind, self.uri))
        })
    }
}

impl BatchPlan {
    /// Load a plan from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading batch plan from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BatchError::Config(format!("Failed to read plan file: {}", e)))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Append the plan's items to `batch`, in order
    pub fn apply(&self, batch: &mut BatchStreamManager) -> Result<()> {
        if let Some(continue_on_error) = self.continue_on_error {
            batch.set_continue_on_error(continue_on_error)?;
        }

        for item in &self.items {
            match item {
                PlanItem::Retrieve(request) => {
                    let request = request.to_request(RequestKind::Retrieve)?;
                    batch.add_retrieve()?.set_request(request)?;
                }
                PlanItem::Changeset { requests } => {
                    let changeset = batch.add_changeset()?;
                    for request in requests {
                        changeset.add_request(request.to_request(RequestKind::Update)?)?;
                    }
                }
                PlanItem::OutsideUpdate(request) => {
                    let request = request.to_request(RequestKind::Update)?;
                    batch.add_outside_update()?.set_request(request)?;
                }
            }
        }

        debug!("Applied plan with {} items", self.items.len());
        Ok(())
    }
}
