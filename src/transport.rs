use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{broadcast, Mutex};

use crate::binding::{Binding, Producer};
use crate::env::{
    env_flag, env_opt, LOG_TRANSPORT_HANDLE_EXCEPTIONS_ENV, LOG_TRANSPORT_LEVEL_ENV,
    LOG_TRANSPORT_SILENT_ENV,
};
use crate::error::{FormatError, SharedError, TransportError};
use crate::format::Format;
use crate::levels::SeverityTable;
use crate::record::{LogRecord, PendingWrite};
use crate::sink::LogSink;

/// Teardown hook replacing the sink's own `close`.
pub type CloseHook = Arc<dyn Fn() + Send + Sync>;

const EVENT_CAPACITY: usize = 64;

/// Construction options for a [`Transport`].
///
/// **Fields**
/// - `level`: threshold level name. Records less severe than this are
///   dropped. When unset the producer's level is used after attach.
/// - `levels`: severity table to use before any producer is attached.
/// - `format`: optional transform applied to a copy of each accepted record.
/// - `handle_exceptions`: deliver records flagged `exception`.
/// - `silent`: drop everything.
/// - `close`: teardown hook run on detach instead of the sink's `close`.
#[derive(Clone, Default)]
pub struct TransportConfig {
    pub level: Option<String>,
    pub levels: Option<Arc<SeverityTable>>,
    pub format: Option<Arc<dyn Format>>,
    pub handle_exceptions: bool,
    pub silent: bool,
    pub close: Option<CloseHook>,
}

impl TransportConfig {
    /// Read `level`, `silent` and `handle_exceptions` from the environment.
    pub fn from_env() -> Self {
        TransportConfig {
            level: env_opt(LOG_TRANSPORT_LEVEL_ENV),
            silent: env_flag(LOG_TRANSPORT_SILENT_ENV),
            handle_exceptions: env_flag(LOG_TRANSPORT_HANDLE_EXCEPTIONS_ENV),
            ..TransportConfig::default()
        }
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn levels(mut self, levels: SeverityTable) -> Self {
        self.levels = Some(Arc::new(levels));
        self
    }

    pub fn format(mut self, format: impl Format + 'static) -> Self {
        self.format = Some(Arc::new(format));
        self
    }

    pub fn handle_exceptions(mut self, on: bool) -> Self {
        self.handle_exceptions = on;
        self
    }

    pub fn silent(mut self, on: bool) -> Self {
        self.silent = on;
        self
    }

    pub fn on_close<F: Fn() + Send + Sync + 'static>(mut self, close: F) -> Self {
        self.close = Some(Arc::new(close));
        self
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("level", &self.level)
            .field("levels", &self.levels)
            .field("format", &self.format.is_some())
            .field("handle_exceptions", &self.handle_exceptions)
            .field("silent", &self.silent)
            .field("close", &self.close.is_some())
            .finish()
    }
}

/// Out-of-band notifications published by a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The format stage raised for `record`. The record was already completed.
    FormatFailed {
        record: LogRecord,
        error: Arc<FormatError>,
    },
    /// A wrapped legacy sink reported an error on its own channel.
    SinkFailed { sink: String, error: SharedError },
    /// The transport ran its teardown.
    Closed,
}

/// Filtering and dispatch front of a [`LogSink`].
///
/// A transport decides per record whether the sink gets to see it, applies
/// the optional format on a private copy, and learns its severity table
/// from whichever [`Producer`] it is attached to.
pub struct Transport {
    config: TransportConfig,
    sink: Arc<dyn LogSink>,
    batching: bool,
    binding: RwLock<Binding>,
    events: broadcast::Sender<TransportEvent>,
    gate: Mutex<()>,
}

impl Transport {
    pub fn new(config: TransportConfig, sink: Arc<dyn LogSink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self::with_events(config, sink, events)
    }

    pub(crate) fn with_events(
        config: TransportConfig,
        sink: Arc<dyn LogSink>,
        events: broadcast::Sender<TransportEvent>,
    ) -> Self {
        let batching = sink.supports_batch();
        let binding = Binding::with_levels(config.levels.clone());
        Transport {
            config,
            sink,
            batching,
            binding: RwLock::new(binding),
            events,
            gate: Mutex::new(()),
        }
    }

    /// Receive format faults, bridged sink errors and close notices.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Effective threshold: explicit, else inherited from the parent.
    pub fn level(&self) -> Option<String> {
        self.config
            .level
            .clone()
            .or_else(|| self.binding().fallback_level())
    }

    pub fn levels(&self) -> Option<Arc<SeverityTable>> {
        self.binding().levels().cloned()
    }

    pub fn parent(&self) -> Option<Arc<dyn Producer>> {
        self.binding().parent()
    }

    pub fn is_attached(&self) -> bool {
        self.parent().is_some()
    }

    /// Bind to `producer`: take its severity table, its level unless one was
    /// configured, and remember it as the current parent.
    pub fn attach<P: Producer + 'static>(&self, producer: &Arc<P>) {
        let producer: Arc<dyn Producer> = Arc::<P>::clone(producer);
        self.attach_dyn(&producer);
    }

    /// [`Transport::attach`] for a producer already held as a trait object.
    pub fn attach_dyn(&self, producer: &Arc<dyn Producer>) {
        let explicit = self.config.level.is_some();
        self.binding_mut().attach(producer, explicit);
        tracing::debug!(level = ?self.level(), "transport attached");
    }

    /// Release `producer`. A detach from anything but the current parent is
    /// ignored; otherwise the parent is cleared and teardown runs once.
    ///
    /// Returns whether teardown ran.
    pub fn detach<P: Producer + ?Sized>(&self, producer: &Arc<P>) -> bool {
        let cleared = self.binding_mut().detach(producer);
        if cleared {
            tracing::debug!("transport detached from parent");
            self.close();
        } else {
            tracing::trace!("ignoring detach from a producer that is not the parent");
        }
        cleared
    }

    /// Run teardown: the configured hook, else the sink's own `close`.
    pub fn close(&self) {
        match &self.config.close {
            Some(hook) => hook(),
            None => self.sink.close(),
        }
        let _ = self.events.send(TransportEvent::Closed);
    }

    /// Whether `record` would be handed to the sink (before formatting).
    pub fn accepts(&self, record: &LogRecord) -> bool {
        if self.config.silent {
            return false;
        }
        if record.exception {
            return self.config.handle_exceptions;
        }

        let binding = self.binding();
        let Some(threshold) = self.config.level.clone().or_else(|| binding.fallback_level()) else {
            return true;
        };
        match binding.levels() {
            Some(levels) => levels.permits(&threshold, record.canonical_level()),
            None => true,
        }
    }

    /// Dispatch one record.
    ///
    /// Resolves once the record is fully handled: right away for dropped
    /// records, otherwise with the sink's own result. A format fault still
    /// resolves `Ok(())` and is then published as
    /// [`TransportEvent::FormatFailed`].
    pub async fn dispatch(&self, record: LogRecord) -> Result<(), TransportError> {
        let _gate = self.gate.lock().await;
        let (result, fault) = self.process(record).await;
        if let Some(fault) = fault {
            self.report(fault);
        }
        result
    }

    /// Dispatch records that were buffered together, preserving order.
    ///
    /// With a batch-capable sink the accepted writes go to
    /// [`LogSink::logv`] in one call and rejected ones are completed here.
    /// Otherwise each write runs the single-record pipeline and is completed
    /// with its own outcome. A format fault completes the faulting write,
    /// is published, and the rest of the batch continues.
    pub async fn dispatch_batch(&self, writes: Vec<PendingWrite>) -> Result<(), TransportError> {
        let _gate = self.gate.lock().await;

        if self.batching {
            let mut accepted = Vec::with_capacity(writes.len());
            for write in writes {
                if self.accepts(&write.record) {
                    accepted.push(write);
                } else {
                    write.complete(Ok(()));
                }
            }
            if accepted.is_empty() {
                return Ok(());
            }
            return self.sink.logv(accepted).await.map_err(TransportError::Sink);
        }

        for write in writes {
            let (record, done) = write.into_parts();
            let (result, fault) = self.process(record).await;
            done.complete(result);
            if let Some(fault) = fault {
                self.report(fault);
            }
        }
        Ok(())
    }

    async fn process(&self, record: LogRecord) -> (Result<(), TransportError>, Option<TransportEvent>) {
        if !self.accepts(&record) {
            tracing::trace!(level = record.canonical_level(), "record dropped by filter");
            return (Ok(()), None);
        }

        let Some(format) = &self.config.format else {
            return (self.deliver(record).await, None);
        };

        match format.transform(record.clone(), format.options()) {
            Ok(Some(mut formatted)) => {
                formatted.restore_canonical_level(&record);
                (self.deliver(formatted).await, None)
            }
            Ok(None) => {
                tracing::trace!(level = record.canonical_level(), "record dropped by format");
                (Ok(()), None)
            }
            Err(error) => {
                let fault = TransportEvent::FormatFailed {
                    record,
                    error: Arc::new(error),
                };
                (Ok(()), Some(fault))
            }
        }
    }

    async fn deliver(&self, record: LogRecord) -> Result<(), TransportError> {
        self.sink.log(record).await.map_err(TransportError::Sink)
    }

    /// Publish a fault; with no subscriber it is logged instead.
    pub(crate) fn report(&self, event: TransportEvent) {
        if let Err(broadcast::error::SendError(event)) = self.events.send(event) {
            match event {
                TransportEvent::FormatFailed { record, error } => {
                    tracing::error!(level = record.canonical_level(), "{}", error);
                }
                TransportEvent::SinkFailed { sink, error } => {
                    tracing::error!(sink = %sink, "sink error: {}", error);
                }
                TransportEvent::Closed => {}
            }
        }
    }

    fn binding(&self) -> RwLockReadGuard<'_, Binding> {
        self.binding.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn binding_mut(&self) -> RwLockWriteGuard<'_, Binding> {
        self.binding.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .field("batching", &self.batching)
            .field("attached", &self.is_attached())
            .finish()
    }
}
