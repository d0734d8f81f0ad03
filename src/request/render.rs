//! Rendering a sub-request as a raw HTTP/1.1 message

use super::types::ODataRequest;
use bytes::{BufMut, BytesMut};
use reqwest::header::CONTENT_LENGTH;

/// Append `METHOD uri HTTP/1.1`, the headers, a blank line and the body to `out`
pub fn render_request(request: &ODataRequest, out: &mut BytesMut) {
    out.put_slice(request.method().as_str().as_bytes());
    out.put_u8(b' ');
    out.put_slice(request.uri().as_bytes());
    out.put_slice(b" HTTP/1.1\r\n");

    for (name, value) in request.headers() {
        out.put_slice(name.as_str().as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }

    if let Some(body) = request.body() {
        if !request.headers().contains_key(CONTENT_LENGTH) {
            out.put_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }
        out.put_slice(b"\r\n");
        out.put_slice(body);
    } else {
        out.put_slice(b"\r\n");
    }
}
