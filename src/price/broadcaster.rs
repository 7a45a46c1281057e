use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::alerts::{BroadcastReport, ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::error::RelayError;
use crate::logging::{ErrorLogger, LogContext, MetricsLogger};
use crate::price::{PriceError, PriceSource};

/// Periodically refreshes the market price and pushes it to every
/// connection in the registry.
///
/// The cached payload lock is held both while a new connection is greeted
/// and registered and while a fresh price is broadcast.
pub struct PriceBroadcaster {
    source: Arc<dyn PriceSource>,
    registry: Arc<ConnectionRegistry>,
    expected_asset: String,
    period: Duration,
    last_price: Mutex<Option<String>>,
    pub shutdown_signal: Arc<AtomicBool>,
}

impl PriceBroadcaster {
    pub fn new(
        source: Arc<dyn PriceSource>,
        registry: Arc<ConnectionRegistry>,
        expected_asset: &str,
        period: Duration,
    ) -> Self {
        Self {
            source,
            registry,
            expected_asset: expected_asset.to_string(),
            period,
            last_price: Mutex::new(None),
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    fn cached(&self) -> MutexGuard<'_, Option<String>> {
        self.last_price.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Most recent price payload, if any quote has been accepted yet
    pub fn last_price(&self) -> Option<String> {
        self.cached().clone()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Greet a new connection with the cached price, then register it
    pub fn accept(&self, handle: ConnectionHandle) -> ConnectionId {
        let cached = self.cached();

        if let Some(payload) = cached.as_deref() {
            // a failed greeting is handled like any other closed connection
            let _ = handle.send(payload);
        }

        let id = self.registry.insert(handle);
        LogContext::new("price_broadcaster", "accept")
            .with_connection(id)
            .with_metadata("greeted", serde_json::json!(cached.is_some()))
            .info("Client connected");
        id
    }

    /// Fetch one quote and, if acceptable, cache and broadcast it
    pub async fn tick(&self) -> Result<BroadcastReport, PriceError> {
        let ticker = self.source.fetch_ticker().await?.validate(&self.expected_asset)?;
        let payload = ticker.to_message().to_payload()?;

        let report = {
            let mut cached = self.cached();
            *cached = Some(payload.clone());
            self.registry.broadcast(&payload)
        };

        MetricsLogger::log_price_broadcast(&ticker.symbol, report.delivered, report.pruned);
        Ok(report)
    }

    /// Tick immediately and then once per period until shut down
    pub async fn run(&self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if self.shutdown_signal.load(Ordering::Relaxed) {
                log::info!("Shutdown signal received, stopping price broadcaster");
                return;
            }

            if let Err(e) = self.tick().await {
                let context = LogContext::new("price_broadcaster", "tick");
                match e {
                    PriceError::AssetMismatch { .. } | PriceError::Stale { .. } | PriceError::Malformed(_) => {
                        context.debug(&format!("Skipping price update: {}", e));
                    }
                    other => ErrorLogger::log_error(&RelayError::Price(other), Some(context)),
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown_signal.store(true, Ordering::Relaxed);
    }
}
