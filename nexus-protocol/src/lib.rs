//! Wire message catalog for the NexusRoom client transport.
//!
//! The wire schema is deliberately decoupled from `nexus-world`'s internal
//! collection types: this crate only knows about frames, not
//! about how the room stores players or enemies. `nexus-server`'s
//! replication pipeline is the sole place that maps one to the other.
//!
//! Each frame is `{type: string, payload: object}`, modeled here as an
//! adjacently-tagged enum (`#[serde(tag = "type", content = "payload")]`).

pub mod close;
pub mod inbound;
pub mod outbound;

pub use close::CloseCode;
pub use inbound::InboundMessage;
pub use outbound::OutboundMessage;
