//! Response-side parsing
//!
//! Three layers: [`multipart`] splits a body into parts by boundary, [`http`]
//! turns one `application/http` part into status/headers/body, and [`cursor`]
//! pulls parts from the transport on demand and correlates them with the items
//! that were sent.

pub mod cursor;
pub mod http;
pub mod multipart;

pub use cursor::BatchResponseItems;
pub use http::{EmbeddedResponse, parse_http_response};
pub use multipart::{MultipartPart, MultipartReader, PartDecoder, split_multipart};
