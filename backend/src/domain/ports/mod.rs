//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driving ports (`SchedulingCommand`, `SchedulingQuery`) are implemented by
//! the lifecycle service. Driven ports are implemented by `outbound`
//! adapters and by the in-memory doubles in `test_support`.

mod macros;
pub(crate) use macros::define_port_error;

mod cache_key;
mod geocoding_source;
mod lifecycle_events;
mod scheduling_cache;
mod scheduling_command;
mod scheduling_metrics;
mod scheduling_query;
mod scheduling_repository;
mod technician_repository;

pub use cache_key::{SchedulingCacheKey, SchedulingCacheKeyParseError};
#[cfg(test)]
pub use geocoding_source::MockGeocodingSource;
pub use geocoding_source::{DisabledGeocodingSource, GeocodingSource, GeocodingSourceError};
#[cfg(test)]
pub use lifecycle_events::{MockLifecycleEventChannel, MockLifecycleEventPublisher};
pub use lifecycle_events::{
    LifecycleEvent, LifecycleEventChannel, LifecycleEventChannelError, LifecycleEventKind,
    LifecycleEventPublishError, LifecycleEventPublisher, NoOpLifecycleEventPublisher,
};
#[cfg(test)]
pub use scheduling_cache::MockSchedulingCache;
pub use scheduling_cache::{NoOpSchedulingCache, SchedulingCache, SchedulingCacheError};
#[cfg(test)]
pub use scheduling_command::MockSchedulingCommand;
pub use scheduling_command::{
    ClientFeedbackRequest, CreateSchedulingRequest, SchedulingCommand, UpdateSchedulingRequest,
};
#[cfg(test)]
pub use scheduling_metrics::MockSchedulingMetrics;
pub use scheduling_metrics::{
    NoOpSchedulingMetrics, SchedulingMetrics, SchedulingMetricsError, SchedulingMutation,
};
#[cfg(test)]
pub use scheduling_query::MockSchedulingQuery;
pub use scheduling_query::SchedulingQuery;
#[cfg(test)]
pub use scheduling_repository::MockSchedulingRepository;
pub use scheduling_repository::{
    FixtureSchedulingRepository, SchedulingRepository, SchedulingRepositoryError,
};
#[cfg(test)]
pub use technician_repository::MockTechnicianRepository;
pub use technician_repository::{
    FixtureTechnicianRepository, TechnicianRepository, TechnicianRepositoryError,
};
