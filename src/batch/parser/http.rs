//! Embedded HTTP message parsing

use crate::error::{BatchError, Result};
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Status line, headers and raw body of one embedded response
#[derive(Debug, Clone)]
pub struct EmbeddedResponse {
    pub status: StatusCode,
    pub message: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Strip a trailing `\n` or `\r\n`
pub(crate) fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parse `Name: value` into `headers`
pub(crate) fn parse_header_line(line: &[u8], headers: &mut HeaderMap) -> Result<()> {
    let colon = line
        .iter()
        .position(|b| *b == b':')
        .ok_or_else(|| {
            BatchError::malformed(format!(
                "header line without a colon: {:?}",
                String::from_utf8_lossy(line)
            ))
        })?;

    let name = HeaderName::from_bytes(line[..colon].trim_ascii())
        .map_err(|e| BatchError::malformed(format!("invalid header name: {}", e)))?;
    let value = HeaderValue::from_bytes(line[colon + 1..].trim_ascii())
        .map_err(|e| BatchError::malformed(format!("invalid value for header {}: {}", name, e)))?;

    headers.append(name, value);
    Ok(())
}

/// Parse `HTTP/1.1 <code> <reason>`
fn parse_status_line(line: &[u8]) -> Result<(StatusCode, String)> {
    let text = std::str::from_utf8(line)
        .map_err(|_| BatchError::malformed("status line is not valid UTF-8"))?;
    let mut parts = text.trim().splitn(3, ' ');

    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(BatchError::malformed(format!(
            "unparseable status line: {:?}",
            text
        )));
    }

    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| BatchError::malformed(format!("invalid status code in: {:?}", text)))?;

    let message = match parts.next().map(str::trim) {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => status.canonical_reason().unwrap_or_default().to_string(),
    };

    Ok((status, message))
}

/// Parse one `application/http` part body as an HTTP response
pub fn parse_http_response(data: &Bytes) -> Result<EmbeddedResponse> {
    let mut pos = 0;
    let mut status_line = None;
    let mut headers = HeaderMap::new();

    while pos < data.len() {
        let end = data[pos..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|i| pos + i + 1)
            .unwrap_or(data.len());
        let line = trim_eol(&data[pos..end]);
        pos = end;

        match status_line {
            None if line.is_empty() => continue,
            None => status_line = Some(parse_status_line(line)?),
            Some(_) if line.is_empty() => break,
            Some(_) => parse_header_line(line, &mut headers)?,
        }
    }

    let (status, message) = status_line
        .ok_or_else(|| BatchError::malformed("embedded response has no status line"))?;

    Ok(EmbeddedResponse {
        status,
        message,
        headers,
        body: data.slice(pos..),
    })
}
