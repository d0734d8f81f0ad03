//! Destination abstraction for encoded batch bodies

use super::channel::ContentSink;
use crate::error::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

/// Something the encoder can push rendered parts into
#[async_trait]
pub trait BodyWriter: Send {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()>;
}

#[async_trait]
impl BodyWriter for ContentSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.write(chunk).await
    }
}

#[async_trait]
impl BodyWriter for BytesMut {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.extend_from_slice(&chunk);
        Ok(())
    }
}

#[async_trait]
impl BodyWriter for Vec<u8> {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.extend_from_slice(&chunk);
        Ok(())
    }
}
