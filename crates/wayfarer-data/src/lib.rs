//! External data access for Wayfarer.
//!
//! Fetches weather, country facts, and points of interest from upstream
//! providers, shapes them into the shared types from `wayfarer-core`, and
//! caches each provider's answers for a fixed TTL.

pub mod cache;
pub mod error;
pub mod gateway;
pub mod providers;

pub use cache::{CachedEntry, TtlCache};
pub use error::DataError;
pub use gateway::ExternalDataGateway;
pub use providers::{
    CountryProvider, GeoPoint, OpenTripMapClient, OpenWeatherClient, PlaceCategory,
    PlacesProvider, RestCountriesClient, WeatherProvider,
};
