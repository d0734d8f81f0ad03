//! Streaming multipart encoder for batch request bodies
//!
//! Every part is rendered into a small buffer and handed to the writer as soon
//! as it is complete, so memory use is bounded by the largest single part.

use super::item::BatchItem;
use crate::error::Result;
use crate::request::headers::{
    APPLICATION_HTTP, BINARY, CONTENT_ID, CONTENT_TRANSFER_ENCODING, multipart_content_type,
};
use crate::request::{ODataRequest, render_request};
use crate::stream::BodyWriter;
use bytes::{BufMut, BytesMut};
use tracing::debug;
use uuid::Uuid;

/// Encoder for one batch body
#[derive(Debug, Clone)]
pub struct MultipartEncoder {
    boundary: String,
}

impl MultipartEncoder {
    pub fn new(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
        }
    }

    /// Fresh random boundary for a batch
    pub fn generate_boundary() -> String {
        format!("batch_{}", Uuid::new_v4())
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Write all items followed by the closing delimiter. Returns the byte count.
    pub async fn encode<W>(&self, items: &[BatchItem], writer: &mut W) -> Result<u64>
    where
        W: BodyWriter + ?Sized,
    {
        for (position, item) in items.iter().enumerate() {
            item.validate(position)?;
        }

        let mut written = 0u64;
        let mut buf = BytesMut::with_capacity(1024);

        for (position, item) in items.iter().enumerate() {
            match item {
                BatchItem::Retrieve(retrieve) => {
                    if let Some(request) = retrieve.request() {
                        self.write_single_part(&self.boundary, request, None, &mut buf);
                    }
                }
                BatchItem::OutsideUpdate(update) => {
                    if let Some(request) = update.request() {
                        self.write_single_part(&self.boundary, request, None, &mut buf);
                    }
                }
                BatchItem::Changeset(changeset) => {
                    put_delimiter(&mut buf, &self.boundary);
                    put_header(
                        &mut buf,
                        "Content-Type",
                        &multipart_content_type(changeset.boundary()),
                    );
                    buf.put_slice(b"\r\n");
                    written += flush(&mut buf, writer).await?;

                    for (content_id, request) in changeset.requests() {
                        self.write_single_part(
                            changeset.boundary(),
                            request,
                            Some(content_id),
                            &mut buf,
                        );
                        written += flush(&mut buf, writer).await?;
                    }

                    put_close_delimiter(&mut buf, changeset.boundary());
                }
            }

            debug!(
                "Encoded batch item {} ({}), {} bytes so far",
                position,
                item.kind_name(),
                written + buf.len() as u64
            );
            written += flush(&mut buf, writer).await?;
        }

        put_close_delimiter(&mut buf, &self.boundary);
        written += flush(&mut buf, writer).await?;

        Ok(written)
    }

    fn write_single_part(
        &self,
        boundary: &str,
        request: &ODataRequest,
        content_id: Option<u32>,
        buf: &mut BytesMut,
    ) {
        put_delimiter(buf, boundary);
        put_header(buf, "Content-Type", APPLICATION_HTTP);
        put_header(buf, CONTENT_TRANSFER_ENCODING, BINARY);
        if let Some(id) = content_id {
            put_header(buf, CONTENT_ID, &id.to_string());
        }
        buf.put_slice(b"\r\n");
        render_request(request, buf);
        buf.put_slice(b"\r\n");
    }
}

fn put_delimiter(buf: &mut BytesMut, boundary: &str) {
    buf.put_slice(b"--");
    buf.put_slice(boundary.as_bytes());
    buf.put_slice(b"\r\n");
}

fn put_close_delimiter(buf: &mut BytesMut, boundary: &str) {
    buf.put_slice(b"--");
    buf.put_slice(boundary.as_bytes());
    buf.put_slice(b"--\r\n");
}

fn put_header(buf: &mut BytesMut, name: &str, value: &str) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_slice(b"\r\n");
}

async fn flush<W>(buf: &mut BytesMut, writer: &mut W) -> Result<u64>
where
    W: BodyWriter + ?Sized,
{
    if buf.is_empty() {
        return Ok(0);
    }
    let chunk = buf.split().freeze();
    let len = chunk.len() as u64;
    writer.write_chunk(chunk).await?;
    Ok(len)
}
