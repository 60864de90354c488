use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::error::{BoxError, SharedError, TransportError};
use crate::record::LogRecord;
use crate::sink::LogSink;
use crate::transport::{Transport, TransportConfig, TransportEvent};

const EVENT_CAPACITY: usize = 64;

/// Older sink shape taking `(level, message, meta)` instead of a record.
///
/// Failures are not returned from `log`; a legacy sink reports them on its
/// own error channel, see [`LegacySink::errors`].
#[async_trait]
pub trait LegacySink: Send + Sync {
    /// Name shown in the deprecation notice and attached to bridged errors.
    fn name(&self) -> &str;

    async fn log(&self, level: &str, message: Option<&str>, meta: &LogRecord);

    /// Threshold used when the adapter is not given one.
    fn level(&self) -> Option<String> {
        None
    }

    fn handle_exceptions(&self) -> bool {
        false
    }

    /// A fresh subscription to the sink's asynchronous errors, if it has any.
    fn errors(&self) -> Option<broadcast::Receiver<SharedError>> {
        None
    }

    fn close(&self) {}
}

/// Options for [`LegacyTransport::new`].
#[derive(Clone, Default)]
pub struct LegacyOptions {
    /// The wrapped sink. Required.
    pub transport: Option<Arc<dyn LegacySink>>,
    pub config: TransportConfig,
    /// Skip the deprecation notice.
    pub quiet: bool,
}

impl LegacyOptions {
    pub fn new(transport: Arc<dyn LegacySink>) -> Self {
        LegacyOptions {
            transport: Some(transport),
            ..LegacyOptions::default()
        }
    }

    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

/// Transport in front of a [`LegacySink`].
///
/// Filtering, formatting and binding are those of [`Transport`], which this
/// type derefs to. Accepted records are translated into
/// `log(canonical_level, message, record)`; errors the sink emits on its own
/// channel are republished as [`TransportEvent::SinkFailed`].
pub struct LegacyTransport {
    inner: Transport,
    sink: Arc<dyn LegacySink>,
}

impl LegacyTransport {
    pub fn new(options: LegacyOptions) -> Result<Self, TransportError> {
        let Some(sink) = options.transport else {
            return Err(TransportError::InvalidConfig(
                "legacy transport requires a sink with a log method".to_string(),
            ));
        };

        let mut config = options.config;
        if config.level.is_none() {
            config.level = sink.level();
        }
        config.handle_exceptions = config.handle_exceptions || sink.handle_exceptions();
        if let Some(hook) = config.close.take() {
            let bridged = Arc::clone(&sink);
            config.close = Some(Arc::new(move || {
                hook();
                remove_bridge(&bridged);
            }));
        }

        if !options.quiet {
            tracing::warn!(
                sink = sink.name(),
                "{} is a legacy transport sink. Consider upgrading it to implement LogSink",
                sink.name()
            );
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        install_bridge(&sink, events.clone());

        let adapter = LegacyAdapter {
            sink: Arc::clone(&sink),
        };
        let inner = Transport::with_events(config, Arc::new(adapter), events);
        Ok(LegacyTransport { inner, sink })
    }

    pub fn sink(&self) -> &Arc<dyn LegacySink> {
        &self.sink
    }
}

impl Deref for LegacyTransport {
    type Target = Transport;

    fn deref(&self) -> &Transport {
        &self.inner
    }
}

impl fmt::Debug for LegacyTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyTransport")
            .field("sink", &self.sink.name())
            .field("inner", &self.inner)
            .finish()
    }
}

struct LegacyAdapter {
    sink: Arc<dyn LegacySink>,
}

#[async_trait]
impl LogSink for LegacyAdapter {
    async fn log(&self, record: LogRecord) -> Result<(), BoxError> {
        self.sink
            .log(record.canonical_level(), record.message.as_deref(), &record)
            .await;
        Ok(())
    }

    fn close(&self) {
        self.sink.close();
        remove_bridge(&self.sink);
    }
}

// Error forwarding is installed once per sink instance, however many
// adapters wrap it. The sink itself is never touched.

struct Bridge {
    sink: Weak<dyn LegacySink>,
    task: JoinHandle<()>,
}

static BRIDGES: OnceLock<Mutex<HashMap<usize, Bridge>>> = OnceLock::new();

fn bridges() -> MutexGuard<'static, HashMap<usize, Bridge>> {
    BRIDGES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn sink_key<S: LegacySink + ?Sized>(sink: &Arc<S>) -> usize {
    Arc::as_ptr(sink).cast::<()>() as usize
}

/// Number of sinks whose errors are currently forwarded.
pub fn bridge_count() -> usize {
    bridges()
        .values()
        .filter(|bridge| bridge.sink.strong_count() > 0)
        .count()
}

/// Whether errors of `sink` are currently forwarded to some adapter.
pub fn is_bridged<S: LegacySink + ?Sized>(sink: &Arc<S>) -> bool {
    bridges()
        .get(&sink_key(sink))
        .is_some_and(|bridge| bridge.sink.strong_count() > 0)
}

fn install_bridge(sink: &Arc<dyn LegacySink>, events: broadcast::Sender<TransportEvent>) -> bool {
    // Sink code runs before the registry lock is taken.
    let name = sink.name().to_string();
    let Some(mut errors) = sink.errors() else {
        return false;
    };
    let Ok(runtime) = Handle::try_current() else {
        tracing::warn!(
            sink = %name,
            "no tokio runtime, errors of this legacy sink will not be forwarded"
        );
        return false;
    };

    let mut bridges = bridges();
    bridges.retain(|_, bridge| {
        let live = bridge.sink.strong_count() > 0;
        if !live {
            bridge.task.abort();
        }
        live
    });
    let key = sink_key(sink);
    if bridges.contains_key(&key) {
        return false;
    }

    let task = runtime.spawn(async move {
        loop {
            match errors.recv().await {
                Ok(error) => {
                    let event = TransportEvent::SinkFailed {
                        sink: name.clone(),
                        error,
                    };
                    if let Err(broadcast::error::SendError(event)) = events.send(event) {
                        if let TransportEvent::SinkFailed { sink, error } = event {
                            tracing::error!(sink = %sink, "sink error: {}", error);
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(sink = %name, missed, "legacy sink errors lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    bridges.insert(
        key,
        Bridge {
            sink: Arc::downgrade(sink),
            task,
        },
    );
    true
}

fn remove_bridge(sink: &Arc<dyn LegacySink>) {
    if let Some(bridge) = bridges().remove(&sink_key(sink)) {
        bridge.task.abort();
    }
}
