//! Error taxonomy for the digest server.
//!
//! Mirrors the five error kinds the core distinguishes: bad input, a failed
//! digest computation, an unreachable reply channel, a fatal resource
//! failure at startup, and an internal invariant violation (a bug, not a
//! recoverable condition).

use thiserror::Error;

/// Errors surfaced by the digest server's core components.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request record was malformed or its path exceeded `path_capacity`.
    #[error("input error: {0}")]
    Input(String),

    /// `DigestFn` could not open or read the file.
    #[error("file error: {0}")]
    File(String),

    /// The outbound reply channel for a client was unreachable.
    #[error("reply error: {0}")]
    Reply(String),

    /// Allocation or thread-creation failed during startup.
    #[error("resource error: {0}")]
    Resource(String),

    /// An invariant the core depends on was violated; this denotes a bug.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ServerError>;
