//! Type conversions into BatchError

use super::types::BatchError;
use reqwest::header::{InvalidHeaderName, InvalidHeaderValue};
use std::string::FromUtf8Error;

impl From<InvalidHeaderName> for BatchError {
    fn from(err: InvalidHeaderName) -> Self {
        BatchError::InvalidRequest(format!("invalid header name: {}", err))
    }
}

impl From<InvalidHeaderValue> for BatchError {
    fn from(err: InvalidHeaderValue) -> Self {
        BatchError::InvalidRequest(format!("invalid header value: {}", err))
    }
}

impl From<FromUtf8Error> for BatchError {
    fn from(err: FromUtf8Error) -> Self {
        BatchError::MalformedBatch(format!("body is not valid UTF-8: {}", err))
    }
}

impl From<url::ParseError> for BatchError {
    fn from(err: url::ParseError) -> Self {
        BatchError::Config(format!("invalid service root URL: {}", err))
    }
}

impl From<tokio::task::JoinError> for BatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        BatchError::Internal(format!("encoder task failed: {}", err))
    }
}
