//! In-process OData service used as a batch transport
//!
//! Decodes the batch body with the crate's own framing decoder, executes each
//! sub-request against an in-memory entity store and answers with a multipart
//! response delivered in small chunks.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use odata_batch::batch::parse_reference;
use odata_batch::batch::parser::{MultipartPart, split_multipart};
use odata_batch::request::headers::{CONTINUE_ON_ERROR, PREFER, boundary_from_content_type};
use odata_batch::{BatchError, BatchTransport, Result, TransportRequest, TransportResponse};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// How the service reports a changeset stopped at a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesetFailureMode {
    /// Nested multipart with the responses up to and including the failure
    Truncated,
    /// One bare application/http part carrying the failure and its Content-ID
    SinglePart,
}

/// One sub-request as the service saw it
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: String,
    pub uri: String,
    pub headers: HashMap<String, String>,
    pub part_headers: HeaderMap,
    pub content_id: Option<u32>,
    pub body: Bytes,
}

impl ParsedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Top-level item as the service saw it
#[derive(Debug, Clone)]
pub enum ParsedItem {
    Single(ParsedRequest),
    Changeset {
        boundary: String,
        requests: Vec<ParsedRequest>,
    },
}

/// A batch received by the service
#[derive(Debug, Clone)]
pub struct RecordedBatch {
    pub headers: HeaderMap,
    pub body: Bytes,
    pub items: Vec<ParsedItem>,
}

impl RecordedBatch {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Canned reply for one sub-request
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Reply {
    fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    fn json(status: u16, value: &Value) -> Self {
        let mut reply = Self::new(status);
        reply
            .headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        reply.body = value.to_string();
        reply
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn render(&self, out: &mut String) {
        let reason = StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown");
        out.push_str(&format!("HTTP/1.1 {} {}\r\n", self.status, reason));
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        if !self.body.is_empty() {
            out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        out.push_str("\r\n");
        out.push_str(&self.body);
    }
}

#[derive(Debug, Clone, Default)]
struct Store {
    entities: BTreeMap<String, Value>,
    next_key: u64,
}

/// In-memory OData service
#[derive(Debug)]
pub struct MockODataService {
    store: Mutex<Store>,
    recorded: Mutex<Vec<RecordedBatch>>,
    failure_mode: ChangesetFailureMode,
    stop_on_failure: bool,
    chunk_size: usize,
    response_boundary: String,
}

impl Default for MockODataService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockODataService {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                entities: BTreeMap::new(),
                next_key: 1,
            }),
            recorded: Mutex::new(Vec::new()),
            failure_mode: ChangesetFailureMode::Truncated,
            stop_on_failure: true,
            chunk_size: 13,
            response_boundary: "batchresponse_0b2c1f".to_string(),
        }
    }

    pub fn with_entity(self, uri: &str, value: Value) -> Self {
        self.store
            .lock()
            .unwrap()
            .entities
            .insert(uri.to_string(), value);
        self
    }

    pub fn with_failure_mode(mut self, mode: ChangesetFailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Keep answering top-level items after a failed one even without continue-on-error
    pub fn without_stop_on_failure(mut self) -> Self {
        self.stop_on_failure = false;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn entity(&self, uri: &str) -> Option<Value> {
        self.store.lock().unwrap().entities.get(uri).cloned()
    }

    pub fn batches_received(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }

    pub fn last_batch(&self) -> Option<RecordedBatch> {
        self.recorded.lock().unwrap().last().cloned()
    }

    fn process(&self, items: &[ParsedItem], continue_on_error: bool) -> String {
        let boundary = &self.response_boundary;
        let mut out = String::new();
        let mut store = self.store.lock().unwrap();

        for item in items {
            match item {
                ParsedItem::Single(request) => {
                    let reply = handle(&mut store, request, &HashMap::new());
                    out.push_str(&format!(
                        "--{}\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n",
                        boundary
                    ));
                    reply.render(&mut out);
                    out.push_str("\r\n");

                    if !reply.is_success() && !continue_on_error && self.stop_on_failure {
                        break;
                    }
                }
                ParsedItem::Changeset { requests, .. } => {
                    let snapshot = store.clone();
                    let mut locations = HashMap::new();
                    let mut replies = Vec::new();
                    let mut failed = false;

                    for request in requests {
                        let reply = handle(&mut store, request, &locations);
                        if let (Some(id), Some(location)) = (request.content_id, location_of(&reply)) {
                            locations.insert(id, location);
                        }
                        let success = reply.is_success();
                        replies.push((request.content_id, reply));
                        if !success && !continue_on_error {
                            failed = true;
                            break;
                        }
                    }

                    if failed {
                        *store = snapshot;
                    }

                    if failed && self.failure_mode == ChangesetFailureMode::SinglePart {
                        let (content_id, reply) = replies.pop().unwrap();
                        let mut reply = reply;
                        if let Some(id) = content_id {
                            reply = reply.with_header("Content-ID", &id.to_string());
                        }
                        out.push_str(&format!(
                            "--{}\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n",
                            boundary
                        ));
                        reply.render(&mut out);
                        out.push_str("\r\n");
                        continue;
                    }

                    let inner = format!("changesetresponse_{}", out.len());
                    out.push_str(&format!(
                        "--{}\r\nContent-Type: multipart/mixed; boundary={}\r\n\r\n",
                        boundary, inner
                    ));
                    for (content_id, reply) in &replies {
                        out.push_str(&format!(
                            "--{}\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n",
                            inner
                        ));
                        if let Some(id) = content_id {
                            out.push_str(&format!("Content-ID: {}\r\n", id));
                        }
                        out.push_str("\r\n");
                        reply.render(&mut out);
                        out.push_str("\r\n");
                    }
                    out.push_str(&format!("--{}--\r\n", inner));
                }
            }
        }

        out.push_str(&format!("--{}--\r\n", boundary));
        out
    }
}

#[async_trait]
impl BatchTransport for MockODataService {
    async fn send(&self, mut request: TransportRequest) -> Result<TransportResponse> {
        let body = request.body.read_all().await?;
        let content_type = request
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let items = parse_batch_body(&content_type, &body)?;
        let continue_on_error = request
            .headers
            .get(PREFER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains(CONTINUE_ON_ERROR))
            .unwrap_or(false);

        let response_body = self.process(&items, continue_on_error);
        self.recorded.lock().unwrap().push(RecordedBatch {
            headers: request.headers,
            body,
            items,
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&format!(
                "multipart/mixed; boundary={}",
                self.response_boundary
            ))
            .unwrap(),
        );

        let bytes = Bytes::from(response_body);
        let chunks: Vec<Result<Bytes>> = (0..bytes.len())
            .step_by(self.chunk_size)
            .map(|start| Ok(bytes.slice(start..(start + self.chunk_size).min(bytes.len()))))
            .collect();

        Ok(TransportResponse {
            status: StatusCode::OK,
            status_message: "OK".to_string(),
            headers,
            body: futures::stream::iter(chunks).boxed(),
        })
    }
}

/// Decode a batch request body into the items the client sent
pub fn parse_batch_body(content_type: &str, body: &[u8]) -> Result<Vec<ParsedItem>> {
    let boundary = boundary_from_content_type(content_type)
        .ok_or_else(|| BatchError::malformed("request has no boundary"))?;

    split_multipart(body, &boundary)?
        .into_iter()
        .map(|part| -> Result<ParsedItem> {
            match part.nested_boundary() {
                Some(inner) => Ok(ParsedItem::Changeset {
                    requests: split_multipart(&part.body, &inner)?
                        .into_iter()
                        .map(parse_request_part)
                        .collect::<Result<_>>()?,
                    boundary: inner,
                }),
                None => Ok(ParsedItem::Single(parse_request_part(part)?)),
            }
        })
        .collect()
}

fn parse_request_part(part: MultipartPart) -> Result<ParsedRequest> {
    let content_id = part.content_id();
    let data = part.body;
    let split = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| BatchError::malformed("request part without header terminator"))?;

    let head = std::str::from_utf8(&data[..split])
        .map_err(|_| BatchError::malformed("request head is not UTF-8"))?;
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut words = request_line.split(' ');
    let method = words.next().unwrap_or_default().to_string();
    let uri = words.next().unwrap_or_default().to_string();
    if words.next() != Some("HTTP/1.1") {
        return Err(BatchError::malformed(format!(
            "bad request line: {:?}",
            request_line
        )));
    }

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_lowercase(), value.trim().to_string()))
        .collect();

    Ok(ParsedRequest {
        method,
        uri,
        headers,
        part_headers: part.headers,
        content_id,
        body: data.slice(split + 4..),
    })
}

fn location_of(reply: &Reply) -> Option<String> {
    reply
        .headers
        .iter()
        .find(|(name, _)| name == "Location")
        .map(|(_, value)| value.clone())
}

fn resolve(uri: &str, locations: &HashMap<u32, String>) -> Option<String> {
    match parse_reference(uri) {
        Some(id) => {
            let base = locations.get(&id)?;
            let rest = uri.find('/').map(|i| &uri[i..]).unwrap_or("");
            Some(format!("{}{}", base, rest))
        }
        None => Some(uri.split('?').next().unwrap_or(uri).to_string()),
    }
}

fn handle(store: &mut Store, request: &ParsedRequest, locations: &HashMap<u32, String>) -> Reply {
    let Some(uri) = resolve(&request.uri, locations) else {
        return Reply::new(400);
    };
    let method = match (request.method.as_str(), request.header("x-http-method")) {
        ("POST", Some(tunnelled)) => tunnelled.to_uppercase(),
        (method, _) => method.to_string(),
    };
    let body: Option<Value> = serde_json::from_slice(&request.body).ok();

    match method.as_str() {
        "GET" => match store.entities.get(&uri) {
            Some(entity) => Reply::json(200, entity),
            None if !uri.contains('(') => {
                let prefix = format!("{}(", uri);
                let values: Vec<Value> = store
                    .entities
                    .iter()
                    .filter(|(key, _)| key.starts_with(&prefix))
                    .map(|(_, value)| value.clone())
                    .collect();
                Reply::json(200, &serde_json::json!({ "value": values }))
            }
            None => Reply::new(404),
        },
        "POST" if !uri.contains('(') => {
            let entity = body.unwrap_or(Value::Null);
            let key = entity
                .as_object()
                .and_then(|o| o.iter().find(|(k, _)| k.ends_with("ID")))
                .and_then(|(_, v)| v.as_u64())
                .unwrap_or_else(|| {
                    store.next_key += 1;
                    store.next_key
                });
            let location = format!("{}({})", uri, key);
            store.entities.insert(location.clone(), entity.clone());
            Reply::json(201, &entity).with_header("Location", &location)
        }
        "POST" => {
            let target = uri.rsplit_once('/').map(|(base, _)| base).unwrap_or(&uri);
            if store.entities.contains_key(target) {
                Reply::new(204)
            } else {
                Reply::new(404)
            }
        }
        "PATCH" | "MERGE" => match (store.entities.get_mut(&uri), body) {
            (Some(Value::Object(existing)), Some(Value::Object(changes))) => {
                existing.extend(changes);
                Reply::new(204)
            }
            (Some(_), _) => Reply::new(400),
            (None, _) => Reply::new(404),
        },
        "PUT" => match store.entities.get_mut(&uri) {
            Some(existing) => {
                *existing = body.unwrap_or(Value::Null);
                Reply::new(204)
            }
            None => Reply::new(404),
        },
        "DELETE" => match store.entities.remove(&uri) {
            Some(_) => Reply::new(204),
            None => Reply::new(404),
        },
        _ => Reply::new(405),
    }
}
