use crate::error::FormatError;
use crate::record::LogRecord;
use std::fmt;
use std::sync::Arc;

/// Format-specific options passed to every transform call.
pub type FormatOptions = serde_json::Map<String, serde_json::Value>;

/// Optional transform applied to accepted records before they reach the sink.
///
/// The transport hands over its own copy of the record, so a format may
/// rewrite it freely. Returning `Ok(None)` filters the record out.
pub trait Format: Send + Sync {
    fn transform(
        &self,
        record: LogRecord,
        options: &FormatOptions,
    ) -> Result<Option<LogRecord>, FormatError>;

    fn options(&self) -> &FormatOptions;
}

type TransformFn =
    dyn Fn(LogRecord, &FormatOptions) -> Result<Option<LogRecord>, FormatError> + Send + Sync;

/// Format built from a closure plus its options.
#[derive(Clone)]
pub struct FnFormat {
    transform: Arc<TransformFn>,
    options: FormatOptions,
}

impl FnFormat {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(LogRecord, &FormatOptions) -> Result<Option<LogRecord>, FormatError>
            + Send
            + Sync
            + 'static,
    {
        FnFormat {
            transform: Arc::new(transform),
            options: FormatOptions::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for FnFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFormat").field("options", &self.options).finish()
    }
}

impl Format for FnFormat {
    fn transform(
        &self,
        record: LogRecord,
        options: &FormatOptions,
    ) -> Result<Option<LogRecord>, FormatError> {
        (self.transform)(record, options)
    }

    fn options(&self) -> &FormatOptions {
        &self.options
    }
}
