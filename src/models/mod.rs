pub mod block;

pub use block::{Block, Contract, ContractParameter, ContractValue, Transaction, TransactionRaw};
