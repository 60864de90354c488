mod common;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{level_and_message, test_levels, TEST_ORDER};
use log_transport::legacy::is_bridged;
use log_transport::{
    LegacyOptions, LegacySink, LegacyTransport, LogRecord, PendingWrite, SharedError,
    StaticProducer, TransportConfig, TransportError, TransportEvent,
};
use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

/// Old-style sink: `log(level, message, meta)` plus an error channel.
struct TestLegacy {
    level: Option<String>,
    handle_exceptions: bool,
    logged: Mutex<Vec<(String, Option<String>, LogRecord)>>,
    errors: broadcast::Sender<SharedError>,
    closes: AtomicUsize,
}

impl TestLegacy {
    fn new() -> Self {
        TestLegacy {
            level: None,
            handle_exceptions: false,
            logged: Mutex::new(Vec::new()),
            errors: broadcast::channel(8).0,
            closes: AtomicUsize::new(0),
        }
    }

    fn levels(&self) -> Vec<String> {
        self.logged.lock().unwrap().iter().map(|(l, _, _)| l.clone()).collect()
    }
}

#[async_trait]
impl LegacySink for TestLegacy {
    fn name(&self) -> &str {
        "TestLegacy"
    }

    async fn log(&self, level: &str, message: Option<&str>, meta: &LogRecord) {
        self.logged.lock().unwrap().push((
            level.to_string(),
            message.map(str::to_string),
            meta.clone(),
        ));
    }

    fn level(&self) -> Option<String> {
        self.level.clone()
    }

    fn handle_exceptions(&self) -> bool {
        self.handle_exceptions
    }

    fn errors(&self) -> Option<broadcast::Receiver<SharedError>> {
        Some(self.errors.subscribe())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn wrap(sink: &Arc<TestLegacy>, config: TransportConfig) -> LegacyTransport {
    let options = LegacyOptions::new(sink.clone()).config(config).quiet();
    LegacyTransport::new(options).unwrap()
}

#[test]
fn construction_without_sink_fails() {
    let err = LegacyTransport::new(LegacyOptions::default()).unwrap_err();
    assert!(matches!(err, TransportError::InvalidConfig(_)));
}

#[tokio::test]
async fn translates_records_into_three_argument_calls() {
    let sink = Arc::new(TestLegacy::new());
    let transport = wrap(&sink, TransportConfig::default().level("info").levels(test_levels()));

    for level in TEST_ORDER {
        transport.dispatch(level_and_message(level)).await.unwrap();
    }

    assert_eq!(sink.levels(), TEST_ORDER[..5].to_vec());
    let logged = sink.logged.lock().unwrap();
    let (level, message, meta) = &logged[4];
    assert_eq!(level, "info");
    assert_eq!(message.as_deref(), Some("Testing message for level: info"));
    assert_eq!(meta.canonical_level(), "info");
}

#[tokio::test]
async fn inherits_level_and_exception_policy_from_sink() {
    let mut legacy = TestLegacy::new();
    legacy.level = Some("warn".to_string());
    legacy.handle_exceptions = true;
    let sink = Arc::new(legacy);
    let transport = wrap(&sink, TransportConfig::default());

    transport.attach(&Arc::new(StaticProducer::new(test_levels(), Some("silly"))));
    assert_eq!(transport.level().as_deref(), Some("warn"));
    assert!(transport.config().handle_exceptions);

    transport.dispatch(level_and_message("info")).await.unwrap();
    transport.dispatch(level_and_message("warn")).await.unwrap();
    transport
        .dispatch(LogRecord::exception("parrot", "crash"))
        .await
        .unwrap();

    assert_eq!(sink.levels(), vec!["warn", "parrot"]);
}

#[tokio::test]
async fn batches_complete_every_write() {
    let sink = Arc::new(TestLegacy::new());
    let transport = wrap(&sink, TransportConfig::default().level("info").levels(test_levels()));

    let (writes, completions): (Vec<_>, Vec<_>) = TEST_ORDER
        .iter()
        .map(|level| PendingWrite::new(level_and_message(level)))
        .unzip();
    transport.dispatch_batch(writes).await.unwrap();

    for completion in completions {
        assert!(matches!(completion.wait().await, Some(Ok(()))));
    }
    assert_eq!(sink.levels(), TEST_ORDER[..5].to_vec());
}

#[tokio::test]
async fn shared_sink_gets_a_single_error_subscription() {
    let sink = Arc::new(TestLegacy::new());
    let first = wrap(&sink, TransportConfig::default());
    let _second = wrap(&sink, TransportConfig::default());

    assert_eq!(sink.errors.receiver_count(), 1);
    assert!(is_bridged(&sink));

    let mut events = first.subscribe();
    let error: SharedError = Arc::new(std::io::Error::other("disk on fire"));
    sink.errors.send(error).unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        TransportEvent::SinkFailed { sink, error } => {
            assert_eq!(sink, "TestLegacy");
            assert_eq!(error.to_string(), "disk on fire");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn close_delegates_and_removes_the_bridge() {
    let sink = Arc::new(TestLegacy::new());
    let transport = wrap(&sink, TransportConfig::default());
    assert!(is_bridged(&sink));

    transport.close();

    assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    assert!(!is_bridged(&sink));
}

#[tokio::test]
async fn detach_from_parent_closes_the_legacy_sink() {
    let sink = Arc::new(TestLegacy::new());
    let transport = wrap(&sink, TransportConfig::default());
    let producer = Arc::new(StaticProducer::new(test_levels(), Some("info")));

    transport.attach(&producer);
    transport.detach(&Arc::new(StaticProducer::new(test_levels(), None)));
    assert_eq!(sink.closes.load(Ordering::SeqCst), 0);

    transport.detach(&producer);
    assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    assert!(!is_bridged(&sink));
}

#[tokio::test]
async fn close_hook_still_removes_the_bridge() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let sink = Arc::new(TestLegacy::new());
    let transport = wrap(
        &sink,
        TransportConfig::default().on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    transport.close();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.closes.load(Ordering::SeqCst), 0);
    assert!(!is_bridged(&sink));
}

#[test]
fn construction_outside_a_runtime_skips_bridging() {
    let sink = Arc::new(TestLegacy::new());
    let transport = wrap(&sink, TransportConfig::default());

    assert!(!is_bridged(&sink));
    transport.close();
    assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
}

/// Keeps `(level, message)` of every event it sees.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<(Level, String)>>>);

impl Captured {
    fn deprecations(&self) -> Vec<(Level, String)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, message)| message.contains("legacy transport sink"))
            .cloned()
            .collect()
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for Captured {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.0.lock().unwrap().push((*event.metadata().level(), message));
    }
}

#[test]
fn deprecation_notice_names_the_sink() {
    let captured = Captured::default();
    let subscriber = Registry::default().with(captured.clone());
    let sink = Arc::new(TestLegacy::new());

    tracing::subscriber::with_default(subscriber, || {
        LegacyTransport::new(LegacyOptions::new(sink.clone())).unwrap();
    });

    let notices = captured.deprecations();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, Level::WARN);
    assert!(notices[0].1.contains("TestLegacy"));
}

#[test]
fn quiet_suppresses_the_deprecation_notice() {
    let captured = Captured::default();
    let subscriber = Registry::default().with(captured.clone());
    let sink = Arc::new(TestLegacy::new());

    tracing::subscriber::with_default(subscriber, || {
        wrap(&sink, TransportConfig::default());
    });

    assert!(captured.deprecations().is_empty());
}

/// Builds another adapter from inside its own `errors` callback.
struct Nesting {
    inner: Arc<TestLegacy>,
    nested: Mutex<Vec<LegacyTransport>>,
    errors: broadcast::Sender<SharedError>,
}

#[async_trait]
impl LegacySink for Nesting {
    fn name(&self) -> &str {
        "Nesting"
    }

    async fn log(&self, _level: &str, _message: Option<&str>, _meta: &LogRecord) {}

    fn errors(&self) -> Option<broadcast::Receiver<SharedError>> {
        let nested = wrap(&self.inner, TransportConfig::default());
        self.nested.lock().unwrap().push(nested);
        Some(self.errors.subscribe())
    }
}

#[tokio::test]
async fn sink_callbacks_may_construct_other_adapters() {
    let inner = Arc::new(TestLegacy::new());
    let outer = Arc::new(Nesting {
        inner: inner.clone(),
        nested: Mutex::new(Vec::new()),
        errors: broadcast::channel(8).0,
    });

    let _transport = LegacyTransport::new(LegacyOptions::new(outer.clone()).quiet()).unwrap();

    assert!(is_bridged(&outer));
    assert!(is_bridged(&inner));
    assert_eq!(outer.nested.lock().unwrap().len(), 1);
}
