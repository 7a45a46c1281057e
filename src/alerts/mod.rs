pub mod connection;
pub mod hub;
pub mod registry;

pub use connection::{ConnectionClosed, ConnectionHandle, ConnectionId};
pub use hub::{AddressEvent, AlertHub, NotifyReport, SubscribeError, SubscriberId, SubscriptionLimits};
pub use registry::{BroadcastReport, ConnectionRegistry};
