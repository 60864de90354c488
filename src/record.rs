use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::oneshot;

use crate::error::TransportError;

/// One structured log entry.
///
/// `level` is the display level and may be rewritten by a format stage.
/// The canonical level key used for severity lookups is kept apart from it
/// and cannot be changed once the record is built; a transport restores it
/// on every formatted copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    #[serde(skip)]
    level_key: String,
    pub message: Option<String>,
    /// Set for records captured from crashes or unhandled failures.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exception: bool,
    pub target: Option<String>,
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Build a record whose display level and canonical level are both `level`.
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        let level = level.into();
        LogRecord {
            timestamp: Utc::now(),
            level_key: level.clone(),
            level,
            message: Some(message.into()),
            exception: false,
            target: None,
            fields: BTreeMap::new(),
        }
    }

    /// Build an exception record (`exception: true`) at `level`.
    pub fn exception(level: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            exception: true,
            ..LogRecord::new(level, message)
        }
    }

    /// The severity key used for threshold checks.
    pub fn canonical_level(&self) -> &str {
        &self.level_key
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub(crate) fn restore_canonical_level(&mut self, original: &LogRecord) {
        if self.level_key != original.level_key {
            self.level_key.clone_from(&original.level_key);
        }
    }
}

/// Completion half held by a write: resolves the producer's [`Completion`].
#[derive(Debug)]
pub struct Completer(Option<oneshot::Sender<Result<(), TransportError>>>);

impl Completer {
    /// A completer nobody waits on.
    pub fn detached() -> Self {
        Completer(None)
    }

    /// Signal the outcome for this write. A dropped receiver is ignored.
    pub fn complete(self, result: Result<(), TransportError>) {
        if let Some(tx) = self.0 {
            let _ = tx.send(result);
        }
    }
}

/// Producer side of a [`PendingWrite`].
#[derive(Debug)]
pub struct Completion(oneshot::Receiver<Result<(), TransportError>>);

impl Completion {
    /// Wait for the write to complete.
    ///
    /// Returns `None` if the write was dropped without ever being completed.
    pub async fn wait(self) -> Option<Result<(), TransportError>> {
        self.0.await.ok()
    }

    /// Non-blocking check; `None` while the write is still pending.
    pub fn try_result(&mut self) -> Option<Result<(), TransportError>> {
        self.0.try_recv().ok()
    }
}

/// One buffered record plus its own completion, as handed to batch dispatch.
#[derive(Debug)]
pub struct PendingWrite {
    pub record: LogRecord,
    done: Completer,
}

impl PendingWrite {
    pub fn new(record: LogRecord) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        (
            PendingWrite {
                record,
                done: Completer(Some(tx)),
            },
            Completion(rx),
        )
    }

    /// A write whose completion is not observed by anyone.
    pub fn detached(record: LogRecord) -> Self {
        PendingWrite {
            record,
            done: Completer::detached(),
        }
    }

    pub fn complete(self, result: Result<(), TransportError>) {
        self.done.complete(result);
    }

    pub fn into_parts(self) -> (LogRecord, Completer) {
        (self.record, self.done)
    }
}
