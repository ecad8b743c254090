//! Unified error type.

use crate::basicauth::ValidationError;

/// The error type returned by todod's fallible operations.
///
/// Per-request failures (401, 404, panics, …) never appear here — they are
/// expressed as HTTP statuses and handled inside the middleware chain. This
/// type surfaces failures that prevent the service from starting or keep the
/// listener from running: bad configuration, rejected credentials, a port
/// that cannot be bound, a store file that cannot be read.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Credential validation failed at startup.
    #[error("invalid credential: {0}")]
    Credential(#[from] ValidationError),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The persisted store file exists but does not parse.
    #[error("corrupt store file: {0}")]
    Store(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
