//! Run ledger: append-only, per-content history of messages and transitions.

pub mod memory;
pub mod replay;
pub mod traits;

pub use memory::InMemoryLedger;
pub use replay::*;
pub use traits::*;
