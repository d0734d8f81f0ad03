//! Error handling for the batch engine
//!
//! This module defines the single error type used throughout the crate.

mod conversions;
mod helpers;
mod types;

pub use types::{BatchError, Result};
