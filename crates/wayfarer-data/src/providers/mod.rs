//! Upstream provider trait definitions and HTTP implementations.
//!
//! Each trait is the narrow call/response contract the gateway depends on;
//! tests substitute their own implementations.

pub mod country;
pub mod places;
pub mod weather;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wayfarer_core::types::{CountryData, Place, WeatherData};

use crate::error::DataError;

pub use country::RestCountriesClient;
pub use places::OpenTripMapClient;
pub use weather::OpenWeatherClient;

/// Current-weather lookup by location name.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_weather(&self, location: &str) -> Result<WeatherData, DataError>;
}

/// Country facts lookup by country name.
#[async_trait]
pub trait CountryProvider: Send + Sync {
    async fn country(&self, name: &str) -> Result<CountryData, DataError>;
}

/// Points-of-interest search around a named destination.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    /// Resolve a destination name to coordinates.
    async fn geocode(&self, destination: &str) -> Result<GeoPoint, DataError>;

    /// Places of one category within the configured radius of `center`.
    async fn nearby(
        &self,
        center: GeoPoint,
        category: PlaceCategory,
    ) -> Result<Vec<Place>, DataError>;
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// The three sub-queries that make up an attractions lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceCategory {
    Attractions,
    Restaurants,
    Hotels,
}

impl PlaceCategory {
    /// OpenTripMap `kinds` filter for this category.
    pub fn kinds(&self) -> &'static str {
        match self {
            PlaceCategory::Attractions => "interesting_places",
            PlaceCategory::Restaurants => "foods",
            PlaceCategory::Hotels => "accomodations",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceCategory::Attractions => "attractions",
            PlaceCategory::Restaurants => "restaurants",
            PlaceCategory::Hotels => "hotels",
        }
    }
}

/// Build the shared HTTP client used by the provider implementations.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, DataError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("wayfarer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DataError::Http)
}

/// Read a response body, mapping non-2xx statuses to errors.
///
/// A 404 becomes `NotFound(subject)`, which the gateway logs at a lower level.
pub(crate) async fn read_success_body(
    response: reqwest::Response,
    subject: &str,
) -> Result<String, DataError> {
    let status = response.status();
    let text = response.text().await?;
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(DataError::NotFound(subject.to_string()));
    }
    if !status.is_success() {
        return Err(DataError::status(status.as_u16(), &text));
    }
    Ok(text)
}
