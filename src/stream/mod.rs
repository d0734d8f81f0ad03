//! Content sink/source abstraction
//!
//! A write-once, read-once byte pipe. The encoder owns the [`ContentSink`] and
//! pushes rendered parts into it; the transport owns the [`ContentSource`] and
//! drains it toward the network. The channel between them is bounded, so memory
//! use stays proportional to the buffer size rather than the batch size.

mod channel;
mod writer;


pub use channel::{ContentSink, ContentSource, content_channel};
pub use writer::BodyWriter;
