pub mod alerts;
pub mod api;
pub mod backoff;
pub mod blockchain;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod price;

pub use alerts::{AlertHub, ConnectionHandle, ConnectionId, ConnectionRegistry, SubscriptionLimits};
pub use api::{AppState, RelayServer};
pub use backoff::{Backoff, BackoffConfig};
pub use blockchain::{address_codec, BlockPoller, BlockPollerConfig, BlockProcessor, HttpNodeClient, NodeClient};
pub use config::{AlertsConfig, AppConfig, DatabaseConfig, LoggingConfig, NodeConfig, PriceConfig, ServerConfig};
pub use database::{Database, ProgressStore};
pub use error::{RelayError, Result};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use price::{CoinMarketCapSource, PriceBroadcaster, PriceSource};
