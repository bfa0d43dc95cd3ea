//! Shared domain types for the Concierge workspace.
//!
//! Every other crate depends on this one for configuration, the shared
//! error type, conversation/tool wire types and the quota/usage model.

pub mod config;
pub mod error;
pub mod quota;
pub mod tool;
pub mod usage;

pub use error::{Error, Result};
