use std::sync::Arc;

use async_trait::async_trait;
use log_transport::{
    LegacyOptions, LegacySink, LegacyTransport, LogRecord, SeverityTable, StaticProducer,
    TransportConfig,
};

/// A sink written against the old `(level, message, meta)` shape.
struct OldConsole;

#[async_trait]
impl LegacySink for OldConsole {
    fn name(&self) -> &str {
        "OldConsole"
    }

    async fn log(&self, level: &str, message: Option<&str>, meta: &LogRecord) {
        println!("[{}] {} {:?}", level, message.unwrap_or(""), meta.fields);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let transport = LegacyTransport::new(
        LegacyOptions::new(Arc::new(OldConsole)).config(TransportConfig::default().level("warn")),
    )?;
    let producer = Arc::new(StaticProducer::new(SeverityTable::npm(), Some("info")));
    transport.attach(&producer);

    transport
        .dispatch(LogRecord::new("info", "filtered out").with_field("user", "ada"))
        .await?;
    transport
        .dispatch(LogRecord::new("error", "delivered").with_field("user", "ada"))
        .await?;

    transport.detach(&producer);
    Ok(())
}
