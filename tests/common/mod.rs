#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use log_transport::{BoxError, LogRecord, LogSink, PendingWrite, SeverityTable};

pub const TEST_ORDER: [&str; 8] = [
    "error", "warn", "dog", "cat", "info", "verbose", "silly", "parrot",
];

pub fn test_levels() -> SeverityTable {
    SeverityTable::from_ordered(TEST_ORDER)
}

pub fn level_and_message(level: &str) -> LogRecord {
    LogRecord::new(level, format!("Testing message for level: {}", level))
}

/// Records everything it is handed.
#[derive(Default)]
pub struct MemorySink {
    pub batching: bool,
    /// Fail records whose message equals this.
    pub fail_on: Option<String>,
    pub records: Mutex<Vec<LogRecord>>,
    pub batches: Mutex<Vec<Vec<LogRecord>>>,
    pub closes: AtomicUsize,
}

impl MemorySink {
    pub fn batching() -> Self {
        MemorySink {
            batching: true,
            ..MemorySink::default()
        }
    }

    pub fn failing_on(message: &str) -> Self {
        MemorySink {
            fail_on: Some(message.to_string()),
            ..MemorySink::default()
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|r| r.message.unwrap_or_default())
            .collect()
    }

    pub fn levels(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|r| r.canonical_level().to_string())
            .collect()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn log(&self, record: LogRecord) -> Result<(), BoxError> {
        if self.fail_on.is_some() && record.message == self.fail_on {
            return Err("sink refused record".into());
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    fn supports_batch(&self) -> bool {
        self.batching
    }

    async fn logv(&self, writes: Vec<PendingWrite>) -> Result<(), BoxError> {
        let mut batch = Vec::with_capacity(writes.len());
        for write in writes {
            batch.push(write.record.clone());
            self.records.lock().unwrap().push(write.record.clone());
            write.complete(Ok(()));
        }
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
