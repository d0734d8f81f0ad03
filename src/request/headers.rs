//! Header names, media types and content-type helpers used on the wire

/// Per-part header carrying the content-id of a changeset sub-request
pub const CONTENT_ID: &str = "Content-ID";

/// Header a server uses to report the content-id of a failed changeset sub-request
pub const CHANGESET_CONTENT_ID_NAME: &str = CONTENT_ID;

pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
pub const BINARY: &str = "binary";
pub const PREFER: &str = "Prefer";
pub const X_HTTP_METHOD: &str = "X-HTTP-Method";

/// Preference asking the server to keep going after a failed sub-request
pub const CONTINUE_ON_ERROR: &str = "odata.continue-on-error";

pub const APPLICATION_HTTP: &str = "application/http";
pub const MULTIPART_MIXED: &str = "multipart/mixed";
pub const APPLICATION_JSON: &str = "application/json";

/// `multipart/mixed;boundary=<boundary>`
pub fn multipart_content_type(boundary: &str) -> String {
    format!("{};boundary={}", MULTIPART_MIXED, boundary)
}

/// Lower-cased media type of a Content-Type value, without parameters
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Boundary parameter of a `multipart/*` Content-Type value
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    if !media_type(content_type).starts_with("multipart/") {
        return None;
    }

    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
