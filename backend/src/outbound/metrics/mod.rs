//! Outbound adapters for metrics exporting.
//!
//! Prometheus-backed implementation of the scheduling metrics port. Compiled
//! only with the `metrics` feature.

mod prometheus_scheduling;

pub use prometheus_scheduling::PrometheusSchedulingMetrics;
