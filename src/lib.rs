//! # odata-batch
//!
//! Streaming OData `$batch` client engine.
//!
//! Many logical reads and writes are bundled into one HTTP exchange using a
//! `multipart/mixed` body. Writes can be grouped into changesets, which the
//! server applies atomically, and later requests in a changeset can refer to
//! the result of an earlier one through its content-id (`$1`, `$2`, ...).
//!
//! ## Features
//!
//! - **Streaming encoder**: parts are written to the transport as they are
//!   rendered, through a bounded channel
//! - **Lazy response parsing**: response items are parsed one at a time as
//!   the caller advances the cursor, and bodies are only decoded on request
//! - **Changesets with content-ids**: per-changeset allocation and `$<n>`
//!   reference checking
//! - **Partial failure handling**: aborted changesets are detected and the
//!   unapplied sub-requests reported
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use odata_batch::{BatchClient, BatchConfig, BatchResponseItem, ODataRequest, UpdateType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BatchClient::new(BatchConfig::default())?;
//!     let mut batch = client.batch_request("http://localhost:9080/Service.svc")?;
//!
//!     batch
//!         .add_retrieve()?
//!         .set_request(ODataRequest::retrieve("Customers(1)"))?;
//!
//!     let changeset = batch.add_changeset()?;
//!     changeset.add_request(ODataRequest::update(
//!         "Customers(1)",
//!         UpdateType::Patch,
//!         r#"{"Name":"new name"}"#,
//!     ))?;
//!     changeset.add_request(ODataRequest::create("Orders", r#"{"OrderID":1000}"#))?;
//!
//!     let response = batch.execute().await?;
//!     println!("batch status: {}", response.status_code());
//!
//!     let items = response.body();
//!     while let Some(item) = items.next().await? {
//!         match item {
//!             BatchResponseItem::Changeset(changeset) => {
//!                 for sub in changeset {
//!                     println!("${:?} -> {}", sub.content_id(), sub.status_code());
//!                 }
//!             }
//!             other => println!("{:?}", other.single().map(|r| r.status_code())),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod request;
pub mod stream;
pub mod transport;

pub use batch::{
    BatchItem, BatchResponse, BatchResponseItem, BatchResponseItems, BatchStreamManager,
    ChangesetItem, ChangesetResponseItem, MultipartEncoder, ODataResponse, OutsideUpdateItem,
    OutsideUpdateResponseItem, RetrieveItem, RetrieveResponseItem,
};
pub use client::BatchClient;
pub use config::{BatchConfig, LoggingConfig, ServiceVersion, Validate};
pub use error::{BatchError, Result};
pub use logging::init_logging;
pub use plan::{BatchPlan, PlanItem, PlanRequest};
pub use request::{ODataFormat, ODataRequest, RequestKind, UpdateType};
pub use stream::{BodyWriter, ContentSink, ContentSource, content_channel};
pub use transport::{BatchTransport, ReqwestTransport, TransportRequest, TransportResponse};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
