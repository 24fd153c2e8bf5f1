//! SQLite-backed run ledger.

mod ledger;

pub use ledger::SqliteLedger;
