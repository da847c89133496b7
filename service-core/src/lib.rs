//! Shared infrastructure for the tenancy workspace: the HTTP error type,
//! listener config, tracing setup and cross-cutting middleware.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
