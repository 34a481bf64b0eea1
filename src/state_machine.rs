//! Per-call bridge state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::{Event, Side};
pub use state::{BridgeState, NegotiatedParams, PeerConnectionState, Session};
pub use transition::transition;
