use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use log_transport::init::{init_tracing_with_config, LayerConfig};
use log_transport::{BoxError, FnFormat, LogRecord, LogSink, Transport, TransportConfig};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Prints every accepted record as one JSON line.
struct JsonStdout;

#[async_trait]
impl LogSink for JsonStdout {
    async fn log(&self, record: LogRecord) -> Result<(), BoxError> {
        println!("{}", serde_json::to_string(&record)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let uppercase = FnFormat::new(|mut record, _| {
        record.level = record.level.to_uppercase();
        Ok(Some(record))
    });

    // Inherits the layer's `info` threshold on attach.
    let everything = Arc::new(Transport::new(
        TransportConfig::from_env().format(uppercase),
        Arc::new(JsonStdout),
    ));
    let errors_only = Arc::new(Transport::new(
        TransportConfig::default().level("error"),
        Arc::new(log_transport::NoopSink),
    ));

    let config = LayerConfig {
        enable_stdout: false,
        ..LayerConfig::from_env()
    };
    if let Err(e) = init_tracing_with_config(vec![everything, errors_only], config) {
        eprintln!("{}", e);
        return;
    }

    let n: u64 = 1_000;
    let start = Instant::now();
    for i in 0..n {
        match i % 3 {
            0 => info!(iteration = i, "stdout transport info"),
            1 => warn!(iteration = i, "stdout transport warning"),
            _ => error!(iteration = i, "stdout transport error"),
        }
    }
    eprintln!("sent {} events in {:?}", n, start.elapsed());

    // Give background task a little time to drain the channel
    sleep(Duration::from_secs(2)).await;
}
