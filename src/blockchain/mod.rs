pub mod address_codec;
pub mod block_poller;
pub mod block_processor;
pub mod node_client;

pub use address_codec::CodecError;
pub use block_poller::{BlockPoller, BlockPollerConfig, PollerError, PollerState, PollerStatus, StepOutcome};
pub use block_processor::{extract_addresses, AddressExtraction, BlockProcessor, BlockSummary, ProcessError};
pub use node_client::{BlockFetch, HttpNodeClient, NodeClient, NodeError};
