//! Configuration management for the batch client
//!
//! Configuration comes from a YAML file, from `ODATA_BATCH_*` environment
//! variables, or from the builder-style setters on [`BatchConfig`].

mod models;
mod validation;

pub use models::{BatchConfig, DEFAULT_ACCEPT, LoggingConfig, ServiceVersion};
pub use validation::Validate;

use crate::error::{BatchError, Result};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

impl BatchConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading batch configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BatchError::Config(format!("Failed to read config file: {}", e)))?;

        let config: BatchConfig = serde_yaml::from_str(&content)
            .map_err(|e| BatchError::Config(format!("Failed to parse config: {}", e)))?;

        config.check()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        debug!("Loading batch configuration from environment variables");

        let mut config = Self::default();

        if let Ok(version) = env::var("ODATA_BATCH_VERSION") {
            config.service_version = version.parse().map_err(BatchError::Config)?;
        }
        if let Ok(accept) = env::var("ODATA_BATCH_ACCEPT") {
            config.accept = accept;
        }
        if let Ok(flag) = env::var("ODATA_BATCH_CONTINUE_ON_ERROR") {
            config.continue_on_error = flag.parse().map_err(|e| {
                BatchError::Config(format!("Invalid continue-on-error flag: {}", e))
            })?;
        }
        if let Ok(timeout) = env::var("ODATA_BATCH_TIMEOUT") {
            config.timeout_secs = timeout
                .parse()
                .map_err(|e| BatchError::Config(format!("Invalid timeout: {}", e)))?;
        }
        if let Ok(chunks) = env::var("ODATA_BATCH_BUFFER_CHUNKS") {
            config.stream_buffer_chunks = chunks
                .parse()
                .map_err(|e| BatchError::Config(format!("Invalid buffer size: {}", e)))?;
        }
        if let Ok(level) = env::var("ODATA_BATCH_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.check()?;
        Ok(config)
    }

    /// Validate the configuration, mapping failures to [`BatchError::Config`]
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(BatchError::Config)
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Transport timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Set the protocol version
    pub fn with_service_version(mut self, version: ServiceVersion) -> Self {
        self.service_version = version;
        self
    }

    /// Set the Accept header negotiated for the batch
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    /// Set whether the server should continue after a failed sub-request
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Set the number of chunks buffered between encoder and transport
    pub fn with_stream_buffer_chunks(mut self, chunks: usize) -> Self {
        self.stream_buffer_chunks = chunks.max(1);
        self
    }

    /// Set the transport timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Add a header sent with every `$batch` request
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }
}
