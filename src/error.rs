//! Error handling for the Ferry library.
//!
//! This module provides the crate-level error type returned by fallible API
//! calls (submitting batches, loading configuration, building clients).
//! Per-item download failures are *not* errors in this sense: they are
//! reported as [`ErrorKind`](crate::item::ErrorKind) tags on the progress
//! model so the rest of a batch keeps running.

use std::io;
use thiserror::Error;

/// Errors that can happen when using Ferry.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from an underlying system.
    ///
    /// This variant captures internal errors that don't fit into other categories,
    /// typically representing unexpected system-level failures.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Error from the underlying URL parser or the expected URL format.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// I/O Error.
    #[error("I/O error")]
    IOError {
        #[from]
        source: io::Error,
    },

    /// Error from the Reqwest library, raised while building the HTTP client.
    #[error("Reqwest Error")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },

    /// The engine configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An item id was submitted while another item with the same id is known.
    #[error("Duplicate item id: {0}")]
    DuplicateItem(String),

    /// The batch handle does not belong to this engine.
    #[error("Unknown batch: {0}")]
    UnknownBatch(u64),

    /// A state update would move an item's phase backwards.
    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// The engine task is gone; no further commands can be processed.
    #[error("The engine has shut down")]
    EngineClosed,
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Result type alias for operations that can fail with a Ferry error.
pub type Result<T> = std::result::Result<T, Error>;
