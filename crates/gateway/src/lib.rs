//! Concierge gateway: HTTP surface, quota engine, supervisor and agents.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
