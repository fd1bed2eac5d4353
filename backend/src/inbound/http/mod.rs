//! HTTP inbound adapter exposing operational endpoints.
//!
//! Business routes are not served over HTTP; this module only carries the
//! probes orchestrators need and, with the `metrics` feature, the scrape
//! endpoint.

pub mod health;
#[cfg(feature = "metrics")]
pub mod metrics;

use actix_web::web;

pub use health::{DependencyProbe, HealthState};

/// Register the operational routes on an actix service config.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::ready).service(health::live);
    #[cfg(feature = "metrics")]
    cfg.service(metrics::metrics);
}
