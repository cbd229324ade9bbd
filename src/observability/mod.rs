//! Observability subsystem.
//!
//! Logging is initialized in `main` via `tracing-subscriber`; this module
//! owns metric definitions and the Prometheus exporter.

pub mod metrics;
