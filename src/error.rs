use std::error::Error;
use std::sync::Arc;

/// Boxed error returned by sinks and formats.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Shareable error, used where one fault fans out to several listeners.
pub type SharedError = Arc<dyn Error + Send + Sync>;

/// Error type returned by transport construction and dispatch.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The transport cannot be built from the supplied options.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// The sink reported a failure for a record or batch.
    #[error("sink failed: {0}")]
    Sink(#[source] BoxError),
}

/// A format stage raised while transforming a record.
#[derive(thiserror::Error, Debug)]
#[error("format transform failed: {0}")]
pub struct FormatError(#[source] pub BoxError);

impl FormatError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        FormatError(err.into())
    }
}

/// Error type returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("global tracing subscriber already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}
