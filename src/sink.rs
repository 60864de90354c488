use crate::error::{BoxError, TransportError};
use crate::record::{LogRecord, PendingWrite};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Destination for [`LogRecord`]s accepted by a transport.
///
/// Implementations do the actual write (file, network, console). The
/// transport only hands over records that passed its filters, in arrival
/// order, and never calls into the sink concurrently.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Write a single record.
    ///
    /// **Returns**
    /// - `Ok(())` once the record has been fully handled.
    /// - `Err(..)` if the destination failed. The error becomes the
    ///   completion of that record only; the transport keeps going.
    async fn log(&self, record: LogRecord) -> Result<(), BoxError>;

    /// Whether [`LogSink::logv`] should receive whole batches.
    ///
    /// Read once when the transport is built. Without batch support each
    /// buffered record goes through the single-record path on its own.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Write a batch of already-filtered records.
    ///
    /// The sink owns the completion of every write in the batch. The
    /// default implementation logs them one by one.
    async fn logv(&self, writes: Vec<PendingWrite>) -> Result<(), BoxError> {
        for write in writes {
            let (record, done) = write.into_parts();
            let result = self.log(record).await.map_err(TransportError::Sink);
            done.complete(result);
        }
        Ok(())
    }

    /// Release resources. Called when the transport is detached from its
    /// producer or closed explicitly.
    fn close(&self) {}
}

type LogFn = Arc<dyn Fn(LogRecord) -> Result<(), BoxError> + Send + Sync>;
type LogvFn = Arc<dyn Fn(Vec<PendingWrite>) -> Result<(), BoxError> + Send + Sync>;
type CloseFn = Arc<dyn Fn() + Send + Sync>;

/// Sink assembled from plain closures.
///
/// Handy for small transports and tests that do not warrant their own type.
#[derive(Clone)]
pub struct FnSink {
    log: LogFn,
    logv: Option<LogvFn>,
    close: Option<CloseFn>,
}

impl FnSink {
    pub fn new<F>(log: F) -> Self
    where
        F: Fn(LogRecord) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        FnSink {
            log: Arc::new(log),
            logv: None,
            close: None,
        }
    }

    /// Install a batch entry point; the sink then advertises batch support.
    pub fn with_logv<F>(mut self, logv: F) -> Self
    where
        F: Fn(Vec<PendingWrite>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.logv = Some(Arc::new(logv));
        self
    }

    pub fn with_close<F>(mut self, close: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.close = Some(Arc::new(close));
        self
    }
}

impl fmt::Debug for FnSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSink")
            .field("logv", &self.logv.is_some())
            .field("close", &self.close.is_some())
            .finish()
    }
}

#[async_trait]
impl LogSink for FnSink {
    async fn log(&self, record: LogRecord) -> Result<(), BoxError> {
        (self.log)(record)
    }

    fn supports_batch(&self) -> bool {
        self.logv.is_some()
    }

    async fn logv(&self, writes: Vec<PendingWrite>) -> Result<(), BoxError> {
        match &self.logv {
            Some(logv) => logv(writes),
            None => {
                for write in writes {
                    let (record, done) = write.into_parts();
                    done.complete((self.log)(record).map_err(TransportError::Sink));
                }
                Ok(())
            }
        }
    }

    fn close(&self) {
        if let Some(close) = &self.close {
            close();
        }
    }
}
