//! Configuration models

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default Accept value negotiated for the whole batch
pub const DEFAULT_ACCEPT: &str = "multipart/mixed";

/// OData protocol version spoken by the target service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ServiceVersion {
    #[serde(rename = "3.0", alias = "v3", alias = "V3")]
    V3,
    #[default]
    #[serde(rename = "4.0", alias = "v4", alias = "V4")]
    V4,
}

impl ServiceVersion {
    /// Header carrying the protocol version of the request
    pub fn version_header(&self) -> &'static str {
        match self {
            ServiceVersion::V3 => "DataServiceVersion",
            ServiceVersion::V4 => "OData-Version",
        }
    }

    /// Header carrying the highest protocol version the client accepts
    pub fn max_version_header(&self) -> &'static str {
        match self {
            ServiceVersion::V3 => "MaxDataServiceVersion",
            ServiceVersion::V4 => "OData-MaxVersion",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceVersion::V3 => "3.0",
            ServiceVersion::V4 => "4.0",
        }
    }
}

impl std::str::FromStr for ServiceVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "3" | "3.0" | "v3" => Ok(ServiceVersion::V3),
            "4" | "4.0" | "v4" => Ok(ServiceVersion::V4),
            other => Err(format!("unsupported OData version: {}", other)),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Settings for one batch client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Protocol version of the target service
    pub service_version: ServiceVersion,
    /// Accept header sent once for the whole batch
    pub accept: String,
    /// Ask the server to keep processing after a failed sub-request
    pub continue_on_error: bool,
    /// Number of encoded chunks buffered between encoder and transport
    pub stream_buffer_chunks: usize,
    /// Transport timeout in seconds
    pub timeout_secs: u64,
    /// User agent for the transport
    pub user_agent: String,
    /// Extra headers added to every `$batch` request
    pub default_headers: HashMap<String, String>,
    /// Logging
    pub logging: LoggingConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            service_version: ServiceVersion::default(),
            accept: DEFAULT_ACCEPT.to_string(),
            continue_on_error: false,
            stream_buffer_chunks: 16,
            timeout_secs: 60,
            user_agent: format!("odata-batch/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}
