//! Orchestration engine: drives content items through their newsroom pipeline.

pub mod config;
mod dispatch;
pub mod engine;
pub mod error;
pub mod journal;
mod machine;

pub use config::*;
pub use engine::Engine;
pub use error::EngineError;
pub use journal::Journal;
