use std::{fmt, io};

/// Error returned by [`Handler::handle`](crate::Handler::handle).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to write record: {0}")]
    Io(#[from] io::Error),
    #[error("failed to format record")]
    Format(#[from] fmt::Error),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Error returned when a handler builder is missing a required part.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("cannot create handler without a downstream handler")]
    MissingHandler,
    #[error("cannot create handler without a sampler")]
    MissingSampler,
}
