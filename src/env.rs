//! Environment variable names used by this crate for convenient
//! configuration of transports from services.
//!
//! These are purely helpers; the core transport types remain decoupled
//! from environment access.

/// Threshold level for [`crate::transport::TransportConfig::from_env`].
pub const LOG_TRANSPORT_LEVEL_ENV: &str = "LOG_TRANSPORT_LEVEL";

/// Drop every record when truthy.
pub const LOG_TRANSPORT_SILENT_ENV: &str = "LOG_TRANSPORT_SILENT";

/// Deliver records flagged as exceptions when truthy.
pub const LOG_TRANSPORT_HANDLE_EXCEPTIONS_ENV: &str = "LOG_TRANSPORT_HANDLE_EXCEPTIONS";

/// Capacity of the layer's record channel.
pub const LOG_TRANSPORT_CHANNEL_BUFFER_ENV: &str = "LOG_TRANSPORT_CHANNEL_BUFFER";

/// Records per batch handed to transports by the layer.
pub const LOG_TRANSPORT_BATCH_SIZE_ENV: &str = "LOG_TRANSPORT_BATCH_SIZE";

/// Flush interval of the layer, in milliseconds.
pub const LOG_TRANSPORT_FLUSH_MS_ENV: &str = "LOG_TRANSPORT_FLUSH_MS";

/// Also print events to stdout through the `fmt` layer when truthy.
pub const LOG_TRANSPORT_STDOUT_ENV: &str = "LOG_TRANSPORT_STDOUT";

/// Threshold of the layer acting as producer.
pub const LOG_TRANSPORT_PRODUCER_LEVEL_ENV: &str = "LOG_TRANSPORT_PRODUCER_LEVEL";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating empty values as unset.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `1`, `true`, `yes` and `on` (any case) are truthy; anything else is not.
pub fn env_flag(key: &str) -> bool {
    env_opt(key).is_some_and(|v| parse_flag(&v))
}

/// Parse a numeric variable, falling back to `default` when unset or invalid.
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
