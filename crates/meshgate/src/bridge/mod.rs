//! Bridge set management: one forwarding process per enabled database
//! bridge, each relaying loopback connections through the mesh proxy.

mod errors;
mod forwarder;
mod manager;

pub use errors::BridgeError;
pub use forwarder::ForwarderPlan;
pub use manager::{BridgeHandle, BridgeSetManager};

const BRIDGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bridge");
