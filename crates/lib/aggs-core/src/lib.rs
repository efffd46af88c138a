//! Core relay pipeline for aggs-relay.
//!
//! This crate turns loosely typed `list_aggs` tool arguments into an upstream
//! query, performs the single upstream call, and normalizes the response (or
//! classifies the failure) into the caller-facing payload.

pub mod dispatch;
pub mod error;
pub mod normalize;
pub mod query;
pub mod upstream;
