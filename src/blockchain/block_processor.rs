use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use crate::alerts::AlertHub;
use crate::blockchain::address_codec::{self, CodecError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{Block, Transaction};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Malformed transaction at index {index}: {reason}")]
    MalformedTransaction { index: usize, reason: String },
    #[error("Cannot encode address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: CodecError,
    },
}

/// Addresses found in one block, plus what had to be skipped
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddressExtraction {
    pub addresses: BTreeSet<String>,
    pub skipped_transactions: usize,
    pub skipped_addresses: usize,
}

/// What processing one block did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub height: u64,
    pub transaction_count: usize,
    pub skipped_transactions: usize,
    pub addresses_touched: usize,
    pub alerts_delivered: usize,
    pub alerts_pruned: usize,
}

/// Collect every distinct owner/recipient address of a block in public form.
///
/// Transactions are parsed one at a time; a transaction that does not parse,
/// or an address that does not encode, is logged and left out.
pub fn extract_addresses(height: u64, block: &Block) -> AddressExtraction {
    let mut extraction = AddressExtraction::default();

    for (index, raw) in block.transactions.iter().enumerate() {
        let transaction = match Transaction::from_value(raw) {
            Ok(transaction) => transaction,
            Err(e) => {
                let error = ProcessError::MalformedTransaction {
                    index,
                    reason: e.to_string(),
                };
                LogContext::new("block_processor", "parse_transaction")
                    .with_block_number(height)
                    .warn(&error.to_string());
                extraction.skipped_transactions += 1;
                continue;
            }
        };

        for raw_address in transaction.participants() {
            match address_codec::encode(raw_address) {
                Ok(public) => {
                    extraction.addresses.insert(public);
                }
                Err(source) => {
                    let error = ProcessError::Address {
                        address: raw_address.to_string(),
                        source,
                    };
                    LogContext::new("block_processor", "encode_address")
                        .with_block_number(height)
                        .with_metadata("tx_id", serde_json::json!(transaction.tx_id))
                        .warn(&error.to_string());
                    extraction.skipped_addresses += 1;
                }
            }
        }
    }

    extraction
}

/// Turns blocks into address alerts
pub struct BlockProcessor {
    hub: Arc<AlertHub>,
}

impl BlockProcessor {
    pub fn new(hub: Arc<AlertHub>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<AlertHub> {
        &self.hub
    }

    /// Extract the block's addresses and notify their subscribers as one batch
    pub fn process_block(&self, height: u64, block: &Block) -> BlockSummary {
        let monitor = PerformanceMonitor::new("process_block")
            .with_metadata("block_number", serde_json::json!(height));

        let extraction = extract_addresses(height, block);

        let report = if extraction.addresses.is_empty() {
            Default::default()
        } else {
            self.hub.notify_addresses(&extraction.addresses)
        };

        let duration = monitor.finish();

        let summary = BlockSummary {
            height,
            transaction_count: block.transactions.len(),
            skipped_transactions: extraction.skipped_transactions,
            addresses_touched: extraction.addresses.len(),
            alerts_delivered: report.delivered,
            alerts_pruned: report.pruned,
        };

        MetricsLogger::log_block_processed(
            height,
            summary.transaction_count,
            summary.addresses_touched,
            summary.alerts_delivered,
            duration,
        );

        summary
    }
}
