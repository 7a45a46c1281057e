use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::Block;

const GET_BLOCK_BY_NUM: &str = "/walletsolidity/getblockbynum";
const GET_NOW_BLOCK: &str = "/walletsolidity/getnowblock";

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Node returned HTTP {status}")]
    Status { status: u16 },
    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Result of asking the node for one block
#[derive(Debug, Clone)]
pub enum BlockFetch {
    Block(Block),
    NotYetProduced,
}

/// Source of blocks by height
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn get_block(&self, height: u64) -> Result<BlockFetch, NodeError>;
}

#[derive(Debug, Serialize)]
struct BlockByNumRequest {
    num: u64,
}

/// HTTP client for a TRON node's solidity API
#[derive(Clone)]
pub struct HttpNodeClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
}

impl HttpNodeClient {
    pub fn new(endpoint: String) -> Result<Self, NodeError> {
        Self::new_with_config(endpoint, 30)
    }

    pub fn new_with_config(endpoint: String, timeout_seconds: u64) -> Result<Self, NodeError> {
        let context = LogContext::new("node_client", "initialization")
            .with_metadata("endpoint", serde_json::json!(endpoint))
            .with_metadata("timeout_seconds", serde_json::json!(timeout_seconds));
        context.info("Initializing node client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout_seconds,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// POST a text/plain body and parse the JSON answer
    async fn post(&self, path: &str, body: String) -> Result<serde_json::Value, NodeError> {
        let response = self
            .client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NodeError::Timeout { seconds: self.timeout_seconds }
                } else if e.is_connect() {
                    NodeError::Connection(e.to_string())
                } else {
                    NodeError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NodeError::Status { status: status.as_u16() });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch a block by height
    pub async fn fetch_block(&self, height: u64) -> Result<BlockFetch, NodeError> {
        let monitor = PerformanceMonitor::new("node_get_block")
            .with_metadata("block_number", serde_json::json!(height));

        let body = serde_json::to_string(&BlockByNumRequest { num: height })?;
        let result = self.post(GET_BLOCK_BY_NUM, body).await.and_then(parse_block_response);

        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_node_call("getblockbynum", duration, result.is_ok());

        if let Ok(BlockFetch::Block(block)) = &result {
            let context = LogContext::new("node_client", "get_block")
                .with_block_number(height)
                .with_metadata("transaction_count", serde_json::json!(block.transactions.len()));
            context.debug(&format!(
                "Retrieved block {} with {} transactions",
                height,
                block.transactions.len()
            ));
        }

        result
    }

    /// Height of the latest solidified block
    pub async fn get_now_block_number(&self) -> Result<u64, NodeError> {
        let value = self.post(GET_NOW_BLOCK, String::new()).await?;
        match parse_block_response(value)? {
            BlockFetch::Block(block) => block
                .number()
                .ok_or_else(|| NodeError::InvalidResponse("Block header has no number".to_string())),
            BlockFetch::NotYetProduced => {
                Err(NodeError::InvalidResponse("Node returned no current block".to_string()))
            }
        }
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn get_block(&self, height: u64) -> Result<BlockFetch, NodeError> {
        self.fetch_block(height).await
    }
}

fn parse_block_response(value: serde_json::Value) -> Result<BlockFetch, NodeError> {
    if !value.is_object() {
        return Err(NodeError::InvalidResponse(format!("Expected a JSON object, got {}", value)));
    }

    let block: Block = serde_json::from_value(value)?;
    if block.has_header() {
        Ok(BlockFetch::Block(block))
    } else {
        Ok(BlockFetch::NotYetProduced)
    }
}
