#![forbid(unsafe_code)]

//! Shared data contracts for the newsroom: ids, states, messages, ledger
//! records and the message schema.

pub mod backoff;
pub mod ids;
pub mod model;
pub mod record;
pub mod schema;
pub mod time;
pub mod types;

pub use backoff::*;
pub use ids::*;
pub use model::*;
pub use record::*;
pub use schema::*;
pub use time::*;
pub use types::*;
