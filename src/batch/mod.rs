//! The batch protocol engine
//!
//! A [`BatchStreamManager`] collects [`BatchItem`]s, the [`MultipartEncoder`]
//! streams them as a `multipart/mixed` body, and the response parser turns
//! the reply back into [`BatchResponseItem`]s in the order the items were
//! appended.

pub mod encoder;
pub mod item;
pub mod manager;
pub mod parser;
pub mod reference;
pub mod response;

pub use encoder::MultipartEncoder;
pub use item::{
    BatchItem, ChangesetItem, ItemShape, OutsideUpdateItem, RetrieveItem, SubRequestShape,
};
pub use manager::BatchStreamManager;
pub use parser::BatchResponseItems;
pub use reference::{ContentIdAllocator, parse_reference, reference_to};
pub use response::{
    BatchResponse, BatchResponseItem, ChangesetResponseItem, ODataResponse,
    OutsideUpdateResponseItem, RetrieveResponseItem,
};
