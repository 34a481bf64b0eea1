//! Wire protocols spoken by the call bridge
//!
//! Both peers exchange JSON text frames. Inbound frames decode into closed
//! enums with an explicit `Unrecognized` variant so an unknown tag is data,
//! not an error. Outbound frames are built from typed values.

mod agent;
mod error;
mod telephony;

pub use agent::{AgentInbound, AgentOutbound};
pub use error::ProtocolError;
pub use telephony::{StartMetadata, TelephonyInbound, TelephonyOutbound};
