//! Infrastructure Layer - Adapters and host integrations.
//!
//! Concrete implementations of the application ports, plus the ambient
//! pieces a host process wires in around the gateway.

/// Configuration loaded from environment variables.
pub mod config;

/// Timer-driven connection health check.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Contract table persistence.
pub mod store;

/// OpenTelemetry tracing integration.
pub mod telemetry;
