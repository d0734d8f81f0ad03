//! Sub-requests carried inside a batch
//!
//! An [`ODataRequest`] is one logical read or write. The batch engine never
//! builds resource paths or serializes entities itself; callers hand it a
//! finished URI and an already-encoded body.

pub mod headers;
mod render;
mod types;

pub use render::render_request;
pub use types::{ODataFormat, ODataRequest, RequestKind, UpdateType};
