//! Error types for the storage engine.
//!
//! ## Error Cases
//! - `Io`: an open, write, rename or remove call failed.
//! - `NotFound`: the queue or message is absent from every folder.
//! - `PartialWrite`: a save wrote fewer bytes than the payload. The file has
//!   already been removed when this is returned.
//! - `InvalidConfig`: the store cannot start with the given configuration.
//! - `InvalidPattern`: a route pattern failed to compile.
//! - `ChannelError`: a request could not be handed to, or answered by, a
//!   worker.
//! - `ServiceShutdown`: a request arrived after the pools were shut down.
//!
//! Losing a fetch race to a peer process, or delivering a message a peer has
//! already claimed, are not errors. They are reported as
//! [`FetchOutcome`](crate::FetchOutcome) variants and counted in
//! [`StoreStats`](crate::StoreStats).

use std::io;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the storage engine.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A single filesystem call failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The queue or message does not exist.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Fewer bytes than the payload length reached the file.
    #[error("Partial write: {written} of {expected} bytes")]
    PartialWrite { written: usize, expected: usize },

    /// The store configuration is unusable.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A route pattern is not a valid regular expression.
    #[error("Invalid route pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Internal channel send/receive failure.
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The worker pools are shutting down.
    #[error("Store is shutting down")]
    ServiceShutdown,
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` if the caller may retry the operation unchanged.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::PartialWrite { .. })
    }
}
