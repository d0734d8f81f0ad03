//! Helper functions for creating and classifying errors

use super::types::BatchError;

impl BatchError {
    pub fn sequence<S: Into<String>>(message: S) -> Self {
        Self::Sequence(message.into())
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedBatch(message.into())
    }

    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Failure below the protocol layer (connection, socket, client)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BatchError::Transport(_) | BatchError::HttpClient(_) | BatchError::Io(_)
        )
    }

    /// Failure of the batch protocol itself (framing, ordering, item population)
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            BatchError::Sequence(_)
                | BatchError::MalformedBatch(_)
                | BatchError::InvalidRequest(_)
                | BatchError::ChangesetAborted { .. }
        )
    }

    /// Whether resending the same batch could succeed.
    ///
    /// The engine never retries on its own; this is a hint for the calling layer.
    pub fn is_retryable(&self) -> bool {
        match self {
            BatchError::Transport(_) | BatchError::Io(_) => true,
            BatchError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            BatchError::BatchRejected { status, .. } => *status == 503 || *status == 429,
            _ => false,
        }
    }

    /// HTTP status attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            BatchError::SubRequestFailure { status, .. } => Some(*status),
            BatchError::BatchRejected { status, .. } => Some(*status),
            BatchError::ChangesetAborted { status, .. } => *status,
            BatchError::HttpClient(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
