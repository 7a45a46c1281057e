use log::{debug, error, info, trace, warn, LevelFilter};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::alerts::ConnectionId;
use crate::config::LoggingConfig;

/// Structured logging context for the relay
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_connection(self, connection: ConnectionId) -> Self {
        self.with_metadata("connection_id", json!(connection.0))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Times one operation and logs the outcome
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    fn elapsed_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn into_context(self, duration: u64) -> LogContext {
        let mut context = LogContext::new("performance", &self.operation).with_duration_ms(duration);
        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }
        context
    }

    pub fn finish(self) -> u64 {
        let duration = self.elapsed_ms();
        self.into_context(duration)
            .debug(&format!("Operation completed in {}ms", duration));
        duration
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();
        let context = self.into_context(duration);

        match result {
            Ok(_) => {
                context.debug(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context
                    .with_metadata("error", json!(e.to_string()))
                    .warn(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &crate::error::RelayError, context: Option<LogContext>) {
        let severity = error.severity();
        let log_context = Self::annotate(error, context);
        let message = format!("Error occurred: {}", error);

        match severity {
            crate::error::ErrorSeverity::Critical => log_context.error(&message),
            crate::error::ErrorSeverity::High => log_context.error(&message),
            crate::error::ErrorSeverity::Medium => log_context.warn(&message),
            crate::error::ErrorSeverity::Low => log_context.info(&message),
        }
    }

    /// Attach error type, severity and recoverability. Retry timing is
    /// owned by the caller's backoff and is not guessed here.
    fn annotate(error: &crate::error::RelayError, context: Option<LogContext>) -> LogContext {
        context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", error.severity())))
            .with_metadata("recoverable", json!(error.is_recoverable()))
    }
}

/// Application metrics, emitted as structured log lines
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_block_processed(
        block_number: u64,
        transaction_count: usize,
        address_count: usize,
        alerts_delivered: usize,
        processing_time_ms: u64,
    ) {
        let context = LogContext::new("metrics", "block_processed")
            .with_block_number(block_number)
            .with_metadata("transaction_count", json!(transaction_count))
            .with_metadata("address_count", json!(address_count))
            .with_metadata("alerts_delivered", json!(alerts_delivered))
            .with_duration_ms(processing_time_ms);

        if address_count > 0 {
            context.info(&format!(
                "Found {} address activities in block {}",
                address_count, block_number
            ));
        } else {
            context.debug(&format!("Block {} processed with no address activity", block_number));
        }
    }

    pub fn log_alert_broadcast(address_count: usize, delivered: usize, pruned: usize) {
        let context = LogContext::new("metrics", "alert_broadcast")
            .with_metadata("address_count", json!(address_count))
            .with_metadata("delivered", json!(delivered))
            .with_metadata("pruned", json!(pruned));

        context.info(&format!("Delivered {} address alerts, pruned {} subscriptions", delivered, pruned));
    }

    pub fn log_price_broadcast(symbol: &str, delivered: usize, pruned: usize) {
        let context = LogContext::new("metrics", "price_broadcast")
            .with_metadata("symbol", json!(symbol))
            .with_metadata("delivered", json!(delivered))
            .with_metadata("pruned", json!(pruned));

        context.info(&format!("Broadcasting {} price to {} clients", symbol, delivered));
    }

    pub fn log_node_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "node_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.trace(&format!("Node call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("Node call {} failed after {}ms", method, duration_ms));
        }
    }
}

/// Initialize logging from configuration; `RUST_LOG` still overrides the level
pub fn init_logging(config: &LoggingConfig) -> Result<(), log::SetLoggerError> {
    let level = config.level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    let pretty = config.format != "json";

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(move |buf, record| {
            use std::io::Write;

            let message = record.args().to_string();
            if pretty {
                if let Ok(json_value) = serde_json::from_str::<Value>(&message) {
                    if let Some(text) = json_value.get("message").and_then(Value::as_str) {
                        return writeln!(
                            buf,
                            "{} [{}] {}: {}",
                            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                            record.level(),
                            json_value.get("component").and_then(Value::as_str).unwrap_or(record.target()),
                            text
                        );
                    }
                }
                writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                )
            } else if serde_json::from_str::<Value>(&message).is_ok() {
                writeln!(buf, "{}", message)
            } else {
                writeln!(
                    buf,
                    "{}",
                    json!({
                        "timestamp": chrono::Utc::now().timestamp(),
                        "level": record.level().to_string(),
                        "component": record.target(),
                        "message": message,
                    })
                )
            }
        })
        .try_init()?;

    info!("Structured logging initialized");
    Ok(())
}
