use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use log::info;

use crate::backoff::{Backoff, BackoffConfig};
use crate::blockchain::block_processor::{BlockProcessor, BlockSummary};
use crate::blockchain::node_client::{BlockFetch, NodeClient};
use crate::database::{DbError, ProgressStore};
use crate::error::RelayError;
use crate::logging::{ErrorLogger, LogContext};

#[derive(Error, Debug)]
pub enum PollerError {
    #[error("Cannot read progress: {0}")]
    Store(#[from] DbError),
}

/// Where the poller currently is in its fetch/process cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Fetching,
    Processing,
    Backoff,
}

/// Result of one fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Block processed and progress persisted
    Processed(BlockSummary),
    /// The node has no block at this height yet
    NotYetProduced,
    /// The node request failed
    FetchFailed,
    /// The block was processed but progress could not be saved
    PersistFailed,
}

pub struct BlockPollerConfig {
    pub backoff: BackoffConfig,
}

impl Default for BlockPollerConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::fixed(Duration::from_secs(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerStatus {
    pub state: PollerState,
    pub last_processed_block: Option<u64>,
    pub is_running: bool,
}

/// Sequential block ingestion.
///
/// Heights are fetched strictly in order starting at `progress + 1`. A
/// height is never skipped: every failure retries the same height after
/// the backoff delay, and progress is persisted before moving on.
pub struct BlockPoller {
    node: Arc<dyn NodeClient>,
    store: Arc<dyn ProgressStore>,
    processor: BlockProcessor,
    pub config: BlockPollerConfig,
    state: Mutex<PollerState>,
    progress: Mutex<Option<Option<u64>>>,
    pub shutdown_signal: Arc<AtomicBool>,
}

impl BlockPoller {
    pub fn new(
        node: Arc<dyn NodeClient>,
        store: Arc<dyn ProgressStore>,
        processor: BlockProcessor,
        config: Option<BlockPollerConfig>,
    ) -> Self {
        Self {
            node,
            store,
            processor,
            config: config.unwrap_or_default(),
            state: Mutex::new(PollerState::Idle),
            progress: Mutex::new(None),
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    fn set_state(&self, state: PollerState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    pub fn state(&self) -> PollerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Last processed height as known to this poller, `None` before the
    /// first block or before progress has been loaded
    pub fn progress(&self) -> Option<u64> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .flatten()
    }

    fn set_progress(&self, height: Option<u64>) {
        *self.progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(height);
    }

    /// Read progress from the store and remember it
    pub fn resume(&self) -> Result<Option<u64>, PollerError> {
        let progress = self.store.load()?;
        self.set_progress(progress);

        match progress {
            Some(height) => info!("Resuming after last processed block {}", height),
            None => info!("No previous progress found, starting from block 0"),
        }
        Ok(progress)
    }

    /// Height the next fetch will ask for
    pub fn next_height(&self) -> Option<u64> {
        let loaded = *self.progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        loaded.map(|progress| progress.map_or(0, |height| height + 1))
    }

    /// Run the fetch/process loop until `shutdown` is called
    pub async fn start(&self) -> Result<(), PollerError> {
        self.resume()?;

        let mut backoff = Backoff::new(self.config.backoff.clone());

        loop {
            if self.shutdown_signal.load(Ordering::Relaxed) {
                info!("Shutdown signal received, stopping block poller");
                self.set_state(PollerState::Idle);
                return Ok(());
            }

            match self.poll_once().await? {
                StepOutcome::Processed(_) => {
                    backoff.reset();
                }
                StepOutcome::NotYetProduced | StepOutcome::FetchFailed | StepOutcome::PersistFailed => {
                    self.set_state(PollerState::Backoff);
                    let delay = backoff.next_delay();
                    LogContext::new("block_poller", "backoff")
                        .with_retry_count(backoff.attempts())
                        .with_duration_ms(delay.as_millis() as u64)
                        .trace("Waiting before the next fetch");
                    sleep(delay).await;
                }
            }
        }
    }

    /// One fetch attempt at the next height. Progress is loaded first if
    /// it has not been yet.
    pub async fn poll_once(&self) -> Result<StepOutcome, PollerError> {
        let height = match self.next_height() {
            Some(height) => height,
            None => self.resume()?.map_or(0, |height| height + 1),
        };

        self.set_state(PollerState::Fetching);
        let fetched = self.node.get_block(height).await;

        let block = match fetched {
            Ok(BlockFetch::Block(block)) => block,
            Ok(BlockFetch::NotYetProduced) => {
                LogContext::new("block_poller", "fetch")
                    .with_block_number(height)
                    .debug("Block not yet produced");
                return Ok(StepOutcome::NotYetProduced);
            }
            Err(e) => {
                ErrorLogger::log_error(
                    &RelayError::Node(e),
                    Some(LogContext::new("block_poller", "fetch").with_block_number(height)),
                );
                return Ok(StepOutcome::FetchFailed);
            }
        };

        if block.number().is_some_and(|number| number != height) {
            LogContext::new("block_poller", "fetch")
                .with_block_number(height)
                .with_metadata("header_number", serde_json::json!(block.number()))
                .warn("Block header number differs from requested height");
        }

        self.set_state(PollerState::Processing);
        let summary = self.processor.process_block(height, &block);

        if let Err(e) = self.store.save(height) {
            ErrorLogger::log_error(
                &RelayError::Database(e),
                Some(LogContext::new("block_poller", "persist").with_block_number(height)),
            );
            return Ok(StepOutcome::PersistFailed);
        }

        self.set_progress(Some(height));
        self.set_state(PollerState::Idle);
        Ok(StepOutcome::Processed(summary))
    }

    /// Request graceful shutdown
    pub fn shutdown(&self) {
        info!("Requesting graceful shutdown");
        self.shutdown_signal.store(true, Ordering::Relaxed);
    }

    pub fn status(&self) -> PollerStatus {
        PollerStatus {
            state: self.state(),
            last_processed_block: self.progress(),
            is_running: !self.shutdown_signal.load(Ordering::Relaxed),
        }
    }
}
