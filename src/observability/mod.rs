//! Observability infrastructure.
//!
//! Provides:
//! - Structured tracing setup for binaries and tests
//! - OpenTelemetry metrics for flush activity

pub mod metrics;
pub mod tracing;
