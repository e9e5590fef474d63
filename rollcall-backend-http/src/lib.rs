//! HTTP implementation of the rollcall backend contract.
//!
//! Speaks the engine's wire protocol (`rollcall_core::protocol`) over a
//! REST-ish surface: POST to upsert a mark, DELETE by record identifier,
//! GET for a day snapshot. The engine stays transport-agnostic; this crate
//! is the one place that knows about URLs and auth headers.

pub mod client;
pub mod config;

pub use client::HttpBackend;
pub use config::HttpBackendConfig;
