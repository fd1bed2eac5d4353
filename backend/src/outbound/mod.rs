//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//! - **redis**: shared Redis connection pool
//! - **cache**: Redis-backed view cache
//! - **queue**: buffered, retrying lifecycle event delivery over Redis lists
//! - **geocoding**: Nominatim reverse geocoding over HTTP
//! - **metrics**: Prometheus-backed metrics exporters (feature-gated)
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod cache;
pub mod geocoding;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod persistence;
pub mod queue;
pub mod redis;
