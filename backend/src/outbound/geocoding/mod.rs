//! Reverse-geocoding outbound adapters.
//!
//! This module provides a thin HTTP implementation of the `GeocodingSource`
//! port against a Nominatim-compatible `reverse` endpoint.

mod dto;
mod http_source;

pub use http_source::{NominatimHttpIdentity, NominatimHttpSource};
