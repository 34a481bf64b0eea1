//! Runtime for bridged calls
//!
//! One [`CallBridge`] per telephony connection. The pure state machine lives in
//! `state_machine`; everything here is I/O.

mod executor;
pub mod traits;
mod transport;

#[cfg(test)]
pub mod testing;

pub use executor::CallBridge;
pub use traits::*;
pub use transport::{agent_link, telephony_link};
