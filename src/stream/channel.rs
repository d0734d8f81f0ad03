//! Bounded producer/consumer byte channel

use crate::error::{BatchError, Result};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Create a connected sink/source pair holding at most `capacity` chunks in flight
pub fn content_channel(capacity: usize) -> (ContentSink, ContentSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let finished = Arc::new(AtomicBool::new(false));

    let sink = ContentSink {
        tx,
        finished: finished.clone(),
        written: 0,
    };
    let source = ContentSource {
        inner: ReceiverStream::new(rx),
        finished,
        pending: Bytes::new(),
        done: false,
    };

    (sink, source)
}

/// Writing half of a content channel
#[derive(Debug)]
pub struct ContentSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
    finished: Arc<AtomicBool>,
    written: u64,
}

impl ContentSink {
    /// Push one chunk, waiting while the channel is full
    pub async fn write(&mut self, chunk: Bytes) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let len = chunk.len() as u64;
        self.tx.send(Ok(chunk)).await.map_err(|_| {
            BatchError::transport("content source closed before the body was complete")
        })?;
        self.written += len;
        Ok(())
    }

    /// Copy and push a byte slice
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.write(Bytes::copy_from_slice(data)).await
    }

    /// Total bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Whether the reading half has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Mark the body complete. The reader sees a clean end of stream.
    pub fn finish(self) {
        debug!("Content sink finished after {} bytes", self.written);
        self.finished.store(true, Ordering::Release);
    }

    /// Terminate the body with an error the reader will observe
    pub async fn abort(self, error: io::Error) {
        debug!("Content sink aborted: {}", error);
        // The reader may already be gone; nothing left to tell it then.
        let _ = self.tx.send(Err(error)).await;
    }
}

/// Reading half of a content channel
///
/// Usable either as a `Stream` of chunks (for handing to an HTTP client) or
/// through the blocking-style [`read`](ContentSource::read) and
/// [`read_all`](ContentSource::read_all) primitives.
#[derive(Debug)]
pub struct ContentSource {
    inner: ReceiverStream<io::Result<Bytes>>,
    finished: Arc<AtomicBool>,
    pending: Bytes,
    done: bool,
}

impl ContentSource {
    /// Read up to `buf.len()` bytes. Returns 0 at the end of the body.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            match self.next().await {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => return Err(BatchError::Io(e)),
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }

    /// Drain the whole body
    pub async fn read_all(&mut self) -> Result<Bytes> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body.freeze())
    }
}

impl Stream for ContentSource {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if !this.pending.is_empty() {
            return Poll::Ready(Some(Ok(std::mem::take(&mut this.pending))));
        }
        if this.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                if this.finished.load(Ordering::Acquire) {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "content sink dropped before the body was finished",
                    ))))
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
