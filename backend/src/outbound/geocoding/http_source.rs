//! Reqwest-backed Nominatim reverse-geocoding adapter.
//!
//! This adapter owns transport details only: query construction, timeout and
//! HTTP error mapping, and JSON decoding into `LocationDetails`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use super::dto::ReverseResponseDto;
use crate::domain::LocationDetails;
use crate::domain::ports::{GeocodingSource, GeocodingSourceError};

const DEFAULT_USER_AGENT: &str = "scheduler-backend-geocoder/0.1";
const DEFAULT_LANGUAGE: &str = "en";

/// Identity headers sent to the provider. Nominatim's usage policy requires
/// a descriptive user agent.
pub struct NominatimHttpIdentity {
    /// HTTP user-agent.
    pub user_agent: String,
    /// `Accept-Language` value used for place names.
    pub language: String,
}

impl Default for NominatimHttpIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            language: DEFAULT_LANGUAGE.to_owned(),
        }
    }
}

/// Geocoding source that calls `<base>/reverse`.
pub struct NominatimHttpSource {
    client: Client,
    reverse_endpoint: Url,
    user_agent: String,
    language: String,
}

impl NominatimHttpSource {
    /// Build an adapter with the default identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_identity(base_url, timeout, NominatimHttpIdentity::default())
    }

    /// Build an adapter with explicit identity headers.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_identity(
        base_url: Url,
        timeout: Duration,
        identity: NominatimHttpIdentity,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            reverse_endpoint: reverse_endpoint(base_url),
            user_agent: identity.user_agent,
            language: identity.language,
        })
    }
}

/// Append `reverse` to the base path, keeping any path prefix.
fn reverse_endpoint(mut base_url: Url) -> Url {
    let path = base_url.path().trim_end_matches('/').to_owned();
    base_url.set_path(&format!("{path}/reverse"));
    base_url.set_query(None);
    base_url
}

fn reverse_url(endpoint: &Url, latitude: f64, longitude: f64) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("format", "jsonv2")
        .append_pair("addressdetails", "1")
        .append_pair("lat", &latitude.to_string())
        .append_pair("lon", &longitude.to_string());
    url
}

#[async_trait]
impl GeocodingSource for NominatimHttpSource {
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<LocationDetails, GeocodingSourceError> {
        let response = self
            .client
            .get(reverse_url(&self.reverse_endpoint, latitude, longitude))
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .header(reqwest::header::ACCEPT_LANGUAGE, self.language.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        parse_location(body.as_ref(), latitude, longitude)
    }
}

fn parse_location(
    body: &[u8],
    latitude: f64,
    longitude: f64,
) -> Result<LocationDetails, GeocodingSourceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(GeocodingSourceError::empty("empty response body"));
    }
    let decoded: ReverseResponseDto = serde_json::from_slice(body).map_err(|error| {
        GeocodingSourceError::decode(format!("invalid reverse geocoding payload: {error}"))
    })?;
    decoded
        .into_location(latitude, longitude)
        .map_err(GeocodingSourceError::empty)
}

fn map_transport_error(error: reqwest::Error) -> GeocodingSourceError {
    if error.is_timeout() {
        GeocodingSourceError::timeout(error.to_string())
    } else {
        GeocodingSourceError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GeocodingSourceError {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            GeocodingSourceError::timeout(format!("status {}", status.as_u16()))
        }
        _ => GeocodingSourceError::status(status.as_u16(), body_preview(body)),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
