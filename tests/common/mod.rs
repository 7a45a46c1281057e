#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

use tron_alert_relay::blockchain::{BlockFetch, NodeClient, NodeError};
use tron_alert_relay::models::Block;

pub const USDT_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
pub const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
pub const ZERO_HEX: &str = "410000000000000000000000000000000000000000";
pub const ZERO: &str = "T9yD14Nj9j7xAB4dbGeiX9h8unkKHxuWwb";

pub fn transfer(owner_hex: &str, to_hex: &str) -> Value {
    json!({
        "txID": format!("{}{}", &owner_hex[2..10], &to_hex[2..10]),
        "raw_data": {
            "contract": [{
                "type": "TransferContract",
                "parameter": {
                    "value": {
                        "owner_address": owner_hex,
                        "to_address": to_hex,
                        "amount": 1_000_000
                    }
                }
            }]
        }
    })
}

pub fn block_json(height: u64, transactions: Vec<Value>) -> Value {
    json!({
        "blockID": format!("{:064x}", height),
        "block_header": {
            "raw_data": { "number": height, "timestamp": 1_529_891_469_000u64 + height * 3000 }
        },
        "transactions": transactions
    })
}

pub fn block(height: u64, transactions: Vec<Value>) -> Block {
    serde_json::from_value(block_json(height, transactions)).unwrap()
}

/// Node that answers from a script and records every request.
/// Once the script runs out it reports "not yet produced".
pub struct ScriptedNode {
    script: Mutex<VecDeque<Result<BlockFetch, NodeError>>>,
    calls: Mutex<Vec<(u64, Instant)>>,
}

impl ScriptedNode {
    pub fn new(script: Vec<Result<BlockFetch, NodeError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(u64, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requested_heights(&self) -> Vec<u64> {
        self.calls().into_iter().map(|(height, _)| height).collect()
    }
}

#[async_trait]
impl NodeClient for ScriptedNode {
    async fn get_block(&self, height: u64) -> Result<BlockFetch, NodeError> {
        self.calls.lock().unwrap().push((height, Instant::now()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(BlockFetch::NotYetProduced))
    }
}
