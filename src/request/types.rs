//! Sub-request types

use super::headers::{APPLICATION_JSON, X_HTTP_METHOD};
use crate::error::{BatchError, Result};
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

/// What a sub-request does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Read an entity, entity set, property or function result
    Retrieve,
    /// Create an entity
    Create,
    /// Update an entity
    Update,
    /// Delete an entity or link
    Delete,
    /// Invoke an action
    Invoke,
}

impl RequestKind {
    /// Whether this kind may appear in a changeset or outside update
    pub fn is_write(&self) -> bool {
        !matches!(self, RequestKind::Retrieve)
    }
}

/// How an update is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Partial update (PATCH)
    #[default]
    Patch,
    /// Full replacement (PUT)
    Replace,
    /// Partial update for services that only understand MERGE,
    /// tunnelled through POST
    Merge,
}

/// Payload format of a sub-request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ODataFormat {
    Json,
    JsonFullMetadata,
    JsonNoMetadata,
    Atom,
    Xml,
}

impl ODataFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            ODataFormat::Json => "application/json;odata.metadata=minimal",
            ODataFormat::JsonFullMetadata => "application/json;odata.metadata=full",
            ODataFormat::JsonNoMetadata => "application/json;odata.metadata=none",
            ODataFormat::Atom => "application/atom+xml",
            ODataFormat::Xml => "application/xml",
        }
    }
}

/// One logical request inside a batch
#[derive(Debug, Clone)]
pub struct ODataRequest {
    kind: RequestKind,
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ODataRequest {
    fn new(kind: RequestKind, method: Method, uri: impl Into<String>) -> Self {
        Self {
            kind,
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// GET `uri`
    pub fn retrieve(uri: impl Into<String>) -> Self {
        Self::new(RequestKind::Retrieve, Method::GET, uri)
    }

    /// POST an already encoded entity to an entity set
    pub fn create(uri: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(RequestKind::Create, Method::POST, uri).with_body(body)
    }

    /// POST a JSON entity to an entity set
    pub fn create_json<T: Serialize>(uri: impl Into<String>, entity: &T) -> Result<Self> {
        Ok(Self::create(uri, serde_json::to_vec(entity)?))
    }

    /// Update the entity at `uri`
    pub fn update(uri: impl Into<String>, update_type: UpdateType, body: impl Into<Bytes>) -> Self {
        let request = match update_type {
            UpdateType::Patch => Self::new(RequestKind::Update, Method::PATCH, uri),
            UpdateType::Replace => Self::new(RequestKind::Update, Method::PUT, uri),
            UpdateType::Merge => Self::new(RequestKind::Update, Method::POST, uri)
                .with_header(
                    HeaderName::from_static("x-http-method"),
                    HeaderValue::from_static("MERGE"),
                ),
        };
        request.with_body(body)
    }

    /// Update the entity at `uri` with a JSON body
    pub fn update_json<T: Serialize>(
        uri: impl Into<String>,
        update_type: UpdateType,
        changes: &T,
    ) -> Result<Self> {
        Ok(Self::update(uri, update_type, serde_json::to_vec(changes)?))
    }

    /// DELETE `uri`
    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(RequestKind::Delete, Method::DELETE, uri)
    }

    /// POST to an action, optionally with parameters
    pub fn invoke(uri: impl Into<String>, parameters: Option<Bytes>) -> Self {
        let request = Self::new(RequestKind::Invoke, Method::POST, uri);
        match parameters {
            Some(body) => request.with_body(body),
            None => request,
        }
    }

    fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }
        self.body = Some(body.into());
        self
    }

    /// Set Accept, and Content-Type when the request has a body
    pub fn with_format(mut self, format: ODataFormat) -> Self {
        let value = HeaderValue::from_static(format.media_type());
        if self.body.is_some() {
            self.headers.insert(CONTENT_TYPE, value.clone());
        }
        self.headers.insert(ACCEPT, value);
        self
    }

    /// Override the Content-Type of the body
    pub fn with_content_type(mut self, content_type: HeaderValue) -> Self {
        self.headers.insert(CONTENT_TYPE, content_type);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a header given as strings
    pub fn try_header(self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        Ok(self.with_header(name, value))
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Method as it should be reported in logs, honouring method tunnelling
    pub fn effective_method(&self) -> &str {
        self.headers
            .get(X_HTTP_METHOD)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(self.method.as_str())
    }

    /// Check that the request can be written as an HTTP request line
    pub fn validate(&self) -> Result<()> {
        if self.uri.is_empty() {
            return Err(BatchError::invalid_request("request URI is empty"));
        }
        if self.uri.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(BatchError::invalid_request(format!(
                "request URI contains whitespace or control characters: {:?}",
                self.uri
            )));
        }
        Ok(())
    }
}
