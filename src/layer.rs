use crate::binding::Producer;
use crate::levels::SeverityTable;
use crate::record::{LogRecord, PendingWrite};
use crate::transport::Transport;
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// The producer side of a [`TransportLayer`]: `tracing` levels plus the
/// configured threshold.
#[derive(Debug)]
pub struct LayerProducer {
    levels: Arc<SeverityTable>,
    level: Option<String>,
}

impl Producer for LayerProducer {
    fn levels(&self) -> Arc<SeverityTable> {
        Arc::clone(&self.levels)
    }

    fn level(&self) -> Option<String> {
        self.level.clone()
    }
}

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// feeds them to a set of [`Transport`]s.
///
/// The layer is the producer the transports are attached to. Records are
/// pushed into a bounded channel; a background task drains it and hands
/// each buffered batch to every transport through batch dispatch, so
/// transport and sink I/O never run on application threads.
pub struct TransportLayer {
    sender: mpsc::Sender<LogRecord>,
    producer: Arc<LayerProducer>,
    transports: Vec<Arc<Transport>>,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl TransportLayer {
    /// Create a new layer, attach `transports` to it and spawn the
    /// background task that flushes batches to them.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations.
    pub fn new(
        transports: Vec<Arc<Transport>>,
        level: Option<String>,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let producer = Arc::new(LayerProducer {
            levels: Arc::new(SeverityTable::tracing()),
            level,
        });
        for transport in &transports {
            transport.attach(&producer);
        }

        let (tx, mut rx) = mpsc::channel::<LogRecord>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let enqueued_events_bg = Arc::clone(&enqueued_events);
        let transports_bg = transports.clone();

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let mut ticker = interval(flush_interval);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(record) => {
                            batch.push(record);
                            enqueued_events_bg.fetch_add(1, Ordering::Relaxed);
                            if batch.len() >= batch_size {
                                flush(&transports_bg, &mut batch).await;
                            }
                        }
                        None => {
                            flush(&transports_bg, &mut batch).await;
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            flush(&transports_bg, &mut batch).await;
                        }
                    }
                }
            }
        });

        (Self {
            sender: tx,
            producer,
            transports,
            total_events,
            enqueued_events,
            dropped_events,
        }, handle)
    }

    pub fn producer(&self) -> &Arc<LayerProducer> {
        &self.producer
    }
}

impl Drop for TransportLayer {
    fn drop(&mut self) {
        for transport in &self.transports {
            transport.detach(&self.producer);
        }
    }
}

// Diagnostics go to stderr here: a `tracing` event from inside the flush
// would come straight back into this layer.
async fn flush(transports: &[Arc<Transport>], batch: &mut Vec<LogRecord>) {
    for transport in transports {
        let writes = batch.iter().cloned().map(PendingWrite::detached).collect();
        if let Err(e) = transport.dispatch_batch(writes).await {
            eprintln!("error dispatching log batch: {}", e);
        }
    }
    batch.clear();
}

impl<S> Layer<S> for TransportLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        // Events from this crate would feed back into the transports.
        if is_own_target(meta.target()) {
            return;
        }
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let exception = fields
            .remove("exception")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let mut record = LogRecord::new(meta.level().as_str().to_ascii_lowercase(), String::new())
            .with_target(meta.target());
        record.message = message;
        record.exception = exception;
        record.fields = fields;
        if let Some(module_path) = meta.module_path() {
            record.fields.insert("module_path".to_string(), module_path.into());
        }

        if let Err(_e) = self.sender.try_send(record) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            eprintln!("log channel full, dropping log record");
        }
    }
}

fn is_own_target(target: &str) -> bool {
    const CRATE: &str = env!("CARGO_CRATE_NAME");
    target
        .strip_prefix(CRATE)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::is_own_target;

    #[test]
    fn only_this_crate_is_filtered() {
        assert!(is_own_target("log_transport"));
        assert!(is_own_target("log_transport::transport"));
        assert!(!is_own_target("log_transport_app"));
        assert!(!is_own_target("log_transport_app::handlers"));
        assert!(!is_own_target("billing"));
    }
}
