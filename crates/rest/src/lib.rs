//! REST execution layer for PASOE web applications.
//!
//! This crate owns the outbound HTTP concerns of the bridge: URL
//! construction, basic authentication, TLS policy, and timeout handling.
//! Every exchange collapses into a [`client::RestOutcome`] value, so callers
//! never branch on error types.

pub mod client;
pub mod config;
