//! AMQP integration for the game master
//!
//! Connection management, the request/response envelopes shared with host
//! controllers, the controller RPC client, the inbound callback consumer and
//! the party fan-out broker.

pub mod broker;
pub mod connection;
pub mod handlers;
pub mod messages;
pub mod rpc;

// Re-export commonly used types
pub use broker::AmqpPartyBroker;
pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::{ActionHandler, ActionRequestConsumer};
pub use messages::{RpcRequest, RpcResponse};
pub use rpc::AmqpHostController;
