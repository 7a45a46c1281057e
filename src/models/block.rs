use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Block as returned by the node's `getblockbynum` endpoint.
///
/// Only the presence of a non-null `block_header` is checked; its fields
/// are read on demand. Transactions stay as raw JSON so that one malformed
/// entry cannot make the whole block unreadable; they are parsed one at a
/// time with [`Transaction::from_value`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "blockID", default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_header: Option<Value>,
    #[serde(default, deserialize_with = "lenient_transactions")]
    pub transactions: Vec<Value>,
}

/// `null` or any non-array value reads as an empty transaction list
fn lenient_transactions<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(transactions) => Ok(transactions),
        _ => Ok(Vec::new()),
    }
}

impl Block {
    /// The node signals "not produced yet" by omitting the header
    pub fn has_header(&self) -> bool {
        self.block_header.is_some()
    }

    /// Height reported by the header, if any
    pub fn number(&self) -> Option<u64> {
        self.block_header
            .as_ref()
            .and_then(|header| header.pointer("/raw_data/number"))
            .and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "txID", default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    pub raw_data: TransactionRaw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRaw {
    #[serde(default)]
    pub contract: Vec<Contract>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub contract_type: Option<String>,
    pub parameter: ContractParameter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractParameter {
    pub value: ContractValue,
}

/// Participant addresses of a contract call, as raw hex
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractValue {
    pub owner_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
}

impl Transaction {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Transaction::deserialize(value)
    }

    /// Owner and (when present) recipient of every contract, in order
    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.raw_data.contract.iter().flat_map(|contract| {
            let value = &contract.parameter.value;
            std::iter::once(value.owner_address.as_str()).chain(value.to_address.as_deref())
        })
    }
}
