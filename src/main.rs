use log::info;
use std::sync::Arc;

use tron_alert_relay::blockchain::BlockPollerConfig;
use tron_alert_relay::error::SystemError;
use tron_alert_relay::logging::init_logging;
use tron_alert_relay::{
    AlertHub, AppConfig, AppState, BackoffConfig, BlockPoller, BlockProcessor, CoinMarketCapSource,
    ConnectionRegistry, Database, ErrorLogger, HttpNodeClient, LogContext, PriceBroadcaster,
    RelayError, RelayServer,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting TRON address alert relay");

    if let Err(e) = run(config).await {
        ErrorLogger::log_error(&e, Some(LogContext::new("relay", "startup")));
        return Err(e.into());
    }

    info!("Relay stopped");
    Ok(())
}

async fn run(config: AppConfig) -> Result<(), RelayError> {
    let database = Arc::new(Database::with_config(&config.database)?);
    let registry = Arc::new(ConnectionRegistry::new());
    let hub = Arc::new(AlertHub::with_limits(Arc::clone(&registry), config.alerts.limits()));

    let broadcaster = if config.price.enabled {
        let source = CoinMarketCapSource::new(config.price.api_url.clone(), config.price.timeout_seconds)?;
        Some(Arc::new(PriceBroadcaster::new(
            Arc::new(source),
            Arc::clone(&registry),
            &config.price.asset_name,
            config.price.update_interval(),
        )))
    } else {
        info!("Price relay disabled");
        None
    };

    let server = RelayServer::new(
        AppState {
            hub: Arc::clone(&hub),
            registry: Arc::clone(&registry),
            store: database.clone(),
            broadcaster: broadcaster.clone(),
        },
        config.server.clone(),
    );
    // a port that cannot be bound ends the process before any block is fetched
    let listener = server.bind().await?;
    let server_task = tokio::spawn(async move { server.serve(listener).await });

    if let Some(broadcaster) = &broadcaster {
        let broadcaster = Arc::clone(broadcaster);
        tokio::spawn(async move { broadcaster.run().await });
    }

    let node = HttpNodeClient::new_with_config(config.node.url.clone(), config.node.timeout_seconds)?;
    let poller = Arc::new(BlockPoller::new(
        Arc::new(node),
        database,
        BlockProcessor::new(hub),
        Some(BlockPollerConfig {
            backoff: BackoffConfig::fixed(config.node.backoff()),
        }),
    ));

    let signal_poller = Arc::clone(&poller);
    let signal_broadcaster = broadcaster.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_poller.shutdown();
                if let Some(broadcaster) = signal_broadcaster {
                    broadcaster.shutdown();
                }
            }
            Err(e) => ErrorLogger::log_error(
                &RelayError::System(SystemError::Signal(e.to_string())),
                Some(LogContext::new("relay", "signal")),
            ),
        }
    });

    let result = poller.start().await;
    server_task.abort();
    result?;
    Ok(())
}
