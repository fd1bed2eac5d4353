//! Field-service scheduling backend.
//!
//! The domain layer owns the scheduling aggregate, its lifecycle service, and
//! the reminder sweep. Outbound adapters bind its ports to PostgreSQL, Redis,
//! Nominatim, and Prometheus; the inbound layer serves operational probes.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{SchedulerSettings, SettingsError};
