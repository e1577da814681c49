//! Inter-junction hint exchange.
//!
//! Implements:
//! - Hint wire format, baseline and signed (repudiation protection)
//! - File-backed mailbox with atomic publish and optional provisioning (DoS protection)

mod protocol;
mod store;

pub use protocol::{HintMode, decode, encode};
pub use store::HintStore;
