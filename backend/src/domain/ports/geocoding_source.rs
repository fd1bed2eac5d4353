//! Driven port for reverse geocoding a coordinate pair.
//!
//! Enrichment is best-effort. The lifecycle service bounds each call with its
//! own timeout and turns every error here into an absent location block.

use async_trait::async_trait;

use crate::domain::LocationDetails;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced while calling the geocoding provider.
    pub enum GeocodingSourceError {
        /// Network transport failed before receiving a response.
        Transport { message: String } =>
            "geocoding transport failed: {message}",
        /// The provider call exceeded its timeout.
        Timeout { message: String } =>
            "geocoding timeout: {message}",
        /// The provider answered with a non-success status.
        Status { status: u16, message: String } =>
            "geocoding provider returned {status}: {message}",
        /// The response body could not be decoded.
        Decode { message: String } =>
            "geocoding response decode failed: {message}",
        /// The provider had nothing usable for the coordinates.
        Empty { message: String } =>
            "geocoding returned no usable address: {message}",
    }
}

/// Port for translating coordinates into a location descriptor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeocodingSource: Send + Sync {
    /// Resolve `(latitude, longitude)` into location details.
    ///
    /// Missing optional address parts are left unset; only an empty or
    /// unusable response is an error.
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<LocationDetails, GeocodingSourceError>;
}

/// Source that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeocodingSource;

#[async_trait]
impl GeocodingSource for DisabledGeocodingSource {
    async fn reverse(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<LocationDetails, GeocodingSourceError> {
        Err(GeocodingSourceError::empty("geocoding is disabled"))
    }
}
