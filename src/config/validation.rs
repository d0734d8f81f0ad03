//! Configuration validation

use super::models::{BatchConfig, LoggingConfig};
use reqwest::header::{HeaderName, HeaderValue};
use tracing::debug;

/// Validation trait for configuration structures
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

impl Validate for BatchConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating batch configuration");

        if self.stream_buffer_chunks == 0 {
            return Err("stream_buffer_chunks must be greater than 0".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }

        let accept = self.accept.trim().to_lowercase();
        if accept.is_empty() {
            return Err("accept must not be empty".to_string());
        }
        if !accept.starts_with("multipart/mixed") && accept != "application/octet-stream" {
            return Err(format!(
                "accept must be multipart/mixed or application/octet-stream, got: {}",
                self.accept
            ));
        }

        for (name, value) in &self.default_headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid default header name: {}", name))?;
            HeaderValue::from_str(value)
                .map_err(|_| format!("invalid value for default header {}", name))?;
        }

        self.logging.validate()?;

        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(()),
            other => Err(format!("invalid log level: {}", other)),
        }
    }
}
