//! Multipart framing
//!
//! [`PartDecoder`] is a line-driven state machine shared by the streaming
//! [`MultipartReader`] (top-level batch body, pulled from the transport) and
//! [`split_multipart`] (nested changeset bodies, already in memory).

use super::http::{parse_header_line, trim_eol};
use crate::error::{BatchError, Result};
use crate::request::headers::{CONTENT_ID, boundary_from_content_type, media_type};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tracing::debug;

/// One boundary-delimited segment: its MIME headers and raw body
#[derive(Debug, Clone)]
pub struct MultipartPart {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MultipartPart {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Inner boundary when this part is itself `multipart/mixed`
    pub fn nested_boundary(&self) -> Option<String> {
        self.content_type().and_then(boundary_from_content_type)
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .map(|ct| media_type(ct).starts_with("multipart/"))
            .unwrap_or(false)
    }

    /// `Content-ID` header parsed as a number
    pub fn content_id(&self) -> Option<u32> {
        self.headers
            .get(CONTENT_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Preamble,
    Headers,
    Body,
    Done,
}

enum Delimiter {
    Next,
    Close,
}

/// Line-driven multipart decoder
#[derive(Debug)]
pub struct PartDecoder {
    delimiter: Vec<u8>,
    state: DecoderState,
    headers: HeaderMap,
    body: BytesMut,
    pending_eol: Option<&'static [u8]>,
    saw_content: bool,
}

impl PartDecoder {
    pub fn new(boundary: &str) -> Self {
        Self {
            delimiter: format!("--{}", boundary).into_bytes(),
            state: DecoderState::Preamble,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            pending_eol: None,
            saw_content: false,
        }
    }

    /// Whether the closing delimiter has been seen
    pub fn is_done(&self) -> bool {
        self.state == DecoderState::Done
    }

    fn classify(&self, content: &[u8]) -> Option<Delimiter> {
        // Transport padding after a delimiter is allowed.
        let content = content.trim_ascii_end();
        let rest = content.strip_prefix(self.delimiter.as_slice())?;
        match rest {
            b"" => Some(Delimiter::Next),
            b"--" => Some(Delimiter::Close),
            _ => None,
        }
    }

    fn take_part(&mut self) -> MultipartPart {
        self.pending_eol = None;
        MultipartPart {
            headers: std::mem::take(&mut self.headers),
            body: self.body.split().freeze(),
        }
    }

    /// Feed one line (including its terminator, if any).
    ///
    /// Returns a part when `line` was the delimiter that closes it.
    pub fn push_line(&mut self, line: &[u8]) -> Result<Option<MultipartPart>> {
        let content = trim_eol(line);
        let eol: &'static [u8] = if line.ends_with(b"\r\n") {
            b"\r\n"
        } else if line.ends_with(b"\n") {
            b"\n"
        } else {
            b""
        };

        match self.state {
            DecoderState::Done => Ok(None),
            DecoderState::Preamble => {
                if !content.trim_ascii().is_empty() {
                    self.saw_content = true;
                }
                match self.classify(content) {
                    Some(Delimiter::Next) => self.state = DecoderState::Headers,
                    Some(Delimiter::Close) => self.state = DecoderState::Done,
                    None => {}
                }
                Ok(None)
            }
            DecoderState::Headers => {
                if let Some(delimiter) = self.classify(content) {
                    // A part with headers but no blank line and no body.
                    return Ok(Some(self.finish_part(delimiter)));
                }
                if content.is_empty() {
                    self.state = DecoderState::Body;
                } else {
                    parse_header_line(content, &mut self.headers)?;
                }
                Ok(None)
            }
            DecoderState::Body => {
                if let Some(delimiter) = self.classify(content) {
                    return Ok(Some(self.finish_part(delimiter)));
                }
                // The line break before a delimiter belongs to the delimiter,
                // so a line's terminator is only committed once another body
                // line follows it.
                if let Some(previous) = self.pending_eol.take() {
                    self.body.extend_from_slice(previous);
                }
                self.body.extend_from_slice(content);
                self.pending_eol = Some(eol);
                Ok(None)
            }
        }
    }

    fn finish_part(&mut self, delimiter: Delimiter) -> MultipartPart {
        self.state = match delimiter {
            Delimiter::Next => DecoderState::Headers,
            Delimiter::Close => DecoderState::Done,
        };
        self.take_part()
    }

    /// Signal the end of input
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            DecoderState::Done => Ok(()),
            DecoderState::Preamble if !self.saw_content => {
                self.state = DecoderState::Done;
                Ok(())
            }
            DecoderState::Preamble => Err(BatchError::malformed(format!(
                "boundary {} not found in body",
                String::from_utf8_lossy(&self.delimiter)
            ))),
            DecoderState::Headers | DecoderState::Body => Err(BatchError::malformed(format!(
                "truncated part: body ended before closing delimiter {}--",
                String::from_utf8_lossy(&self.delimiter)
            ))),
        }
    }
}

/// Split an in-memory multipart body into its parts
pub fn split_multipart(body: &[u8], boundary: &str) -> Result<Vec<MultipartPart>> {
    let mut decoder = PartDecoder::new(boundary);
    let mut parts = Vec::new();

    for line in body.split_inclusive(|b| *b == b'\n') {
        if let Some(part) = decoder.push_line(line)? {
            parts.push(part);
        }
        if decoder.is_done() {
            break;
        }
    }

    decoder.finish()?;
    Ok(parts)
}

/// Pull-based multipart reader over a chunked byte stream
pub struct MultipartReader {
    source: BoxStream<'static, Result<Bytes>>,
    buffer: BytesMut,
    // Prefix of `buffer` already known to hold no line break
    scanned: usize,
    decoder: PartDecoder,
    eof: bool,
    parts_read: usize,
}

impl std::fmt::Debug for MultipartReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartReader")
            .field("decoder", &self.decoder)
            .field("buffered", &self.buffer.len())
            .field("eof", &self.eof)
            .field("parts_read", &self.parts_read)
            .finish()
    }
}

impl MultipartReader {
    pub fn new(source: BoxStream<'static, Result<Bytes>>, boundary: &str) -> Self {
        Self {
            source,
            buffer: BytesMut::new(),
            scanned: 0,
            decoder: PartDecoder::new(boundary),
            eof: false,
            parts_read: 0,
        }
    }

    /// A reader that yields no parts
    pub fn empty() -> Self {
        let mut reader = Self::new(futures::stream::empty().boxed(), "");
        reader.eof = true;
        reader.decoder.state = DecoderState::Done;
        reader
    }

    pub fn parts_read(&self) -> usize {
        self.parts_read
    }

    /// Read the next part, pulling from the source only as far as needed
    pub async fn next_part(&mut self) -> Result<Option<MultipartPart>> {
        loop {
            if self.decoder.is_done() {
                return Ok(None);
            }

            if let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
                let line = self.buffer.split_to(self.scanned + offset + 1);
                self.scanned = 0;
                if let Some(part) = self.decoder.push_line(&line)? {
                    return Ok(Some(self.record(part)));
                }
                continue;
            }

            if self.eof {
                if !self.buffer.is_empty() {
                    let line = self.buffer.split();
                    self.scanned = 0;
                    if let Some(part) = self.decoder.push_line(&line)? {
                        return Ok(Some(self.record(part)));
                    }
                }
                self.decoder.finish()?;
                return Ok(None);
            }

            self.scanned = self.buffer.len();
            match self.source.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(e),
                None => self.eof = true,
            }
        }
    }

    fn record(&mut self, part: MultipartPart) -> MultipartPart {
        self.parts_read += 1;
        debug!(
            "Read multipart part {} ({} body bytes)",
            self.parts_read,
            part.body.len()
        );
        part
    }
}
