//! Role plugin contract, role registry and newsroom pipeline composition.

pub mod error;
pub mod pipeline;
pub mod registry;
pub mod role;

pub use error::ConfigurationError;
pub use pipeline::*;
pub use registry::*;
pub use role::*;
