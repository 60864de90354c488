//! Transport base for structured log sinks.
//!
//! A [`Transport`] sits between a producer of [`LogRecord`]s and a
//! [`LogSink`]. It filters records by severity and exception policy, applies
//! an optional [`Format`] on a private copy, delivers single records or
//! batches in arrival order, and learns its [`SeverityTable`] by being
//! attached to a [`Producer`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use log_transport::{NoopSink, SeverityTable, StaticProducer, Transport, TransportConfig, LogRecord};
//!
//! let transport = Transport::new(TransportConfig::default().level("warn"), Arc::new(NoopSink));
//! let producer = Arc::new(StaticProducer::new(SeverityTable::npm(), Some("info")));
//! transport.attach(&producer);
//! transport.dispatch(LogRecord::new("error", "disk full")).await?;
//! ```

pub mod binding;
pub mod env;
pub mod error;
pub mod format;
pub mod init;
pub mod layer;
pub mod legacy;
pub mod levels;
pub mod noop_sink;
pub mod record;
pub mod sink;
pub mod transport;

pub use binding::{Producer, StaticProducer};
pub use error::{BoxError, FormatError, SharedError, TransportError};
pub use format::{FnFormat, Format, FormatOptions};
pub use legacy::{LegacyOptions, LegacySink, LegacyTransport};
pub use levels::SeverityTable;
pub use noop_sink::NoopSink;
pub use record::{Completion, LogRecord, PendingWrite};
pub use sink::{FnSink, LogSink};
pub use transport::{Transport, TransportConfig, TransportEvent};
