//! Built-in tools for Concierge agents.
//!
//! - `calculator`: evaluate an arithmetic expression
//! - `weather`: canned weather report for a handful of cities

pub mod calculator;
pub mod registry;
pub mod weather;

pub use registry::{builtin_registry, Tool, ToolRegistry};
