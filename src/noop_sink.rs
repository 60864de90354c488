use crate::error::BoxError;
use crate::record::{LogRecord, PendingWrite};
use crate::sink::LogSink;
use async_trait::async_trait;

/// A sink that simply drops all records.
///
/// Useful for measuring the overhead of the transport itself without any
/// external I/O, and for unit tests that don't care about persistence.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn log(&self, _record: LogRecord) -> Result<(), BoxError> {
        Ok(())
    }

    fn supports_batch(&self) -> bool {
        true
    }

    async fn logv(&self, writes: Vec<PendingWrite>) -> Result<(), BoxError> {
        for write in writes {
            write.complete(Ok(()));
        }
        Ok(())
    }
}
