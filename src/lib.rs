//! Quantified Me: personal health-metrics tracking API.
//!
//! Metrics are always read and written through owner-scoped statements; the
//! caller's identity comes from a bearer token verified against the external
//! identity provider on every request.

pub mod app;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod state;
