//! Entry point for issuing batches against one or more services

use crate::batch::BatchStreamManager;
use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use crate::transport::{BatchTransport, ReqwestTransport};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Holds the configuration and transport shared by every batch it creates
#[derive(Clone)]
pub struct BatchClient {
    config: BatchConfig,
    transport: Arc<dyn BatchTransport>,
}

impl std::fmt::Debug for BatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchClient {
    /// Create a client that sends over HTTP
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.check()?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over a custom transport
    pub fn with_transport(config: BatchConfig, transport: Arc<dyn BatchTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Start a new batch against the service rooted at `service_root`
    pub fn batch_request(&self, service_root: &str) -> Result<BatchStreamManager> {
        let endpoint = batch_endpoint(service_root)?;
        debug!("New batch for {}", endpoint);
        Ok(BatchStreamManager::new(
            endpoint,
            self.config.clone(),
            self.transport.clone(),
        ))
    }
}

/// `<service_root>/$batch`
pub fn batch_endpoint(service_root: &str) -> Result<Url> {
    let mut url = Url::parse(service_root)?;
    if url.cannot_be_a_base() {
        return Err(BatchError::config(format!(
            "service root {} cannot carry a path",
            service_root
        )));
    }
    url.set_query(None);
    url.set_fragment(None);

    url.path_segments_mut()
        .map_err(|_| BatchError::config(format!("service root {} has no path", service_root)))?
        .pop_if_empty()
        .push("$batch");
    Ok(url)
}
