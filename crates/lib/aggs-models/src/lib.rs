//! Data model and shared constants for aggs-relay.
//!
//! This crate defines the aggregate query, bar, and result types shared by the
//! relay core, the MCP surface, and the reference upstream server.

pub mod models;
pub mod schema;

pub use models::*;
