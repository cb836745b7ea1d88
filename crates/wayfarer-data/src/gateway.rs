//! Cached facade over the weather, country, and places providers.
//!
//! Every lookup returns `Option`: a missing value means the data was not
//! available, for whatever reason. Provider failures are logged here and go
//! no further.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use wayfarer_core::types::{AttractionsData, CountryData, Place, WeatherData};
use wayfarer_core::WayfarerConfig;

use crate::cache::TtlCache;
use crate::error::DataError;
use crate::providers::{
    http_client, CountryProvider, OpenTripMapClient, OpenWeatherClient, PlaceCategory,
    PlacesProvider, RestCountriesClient, WeatherProvider,
};

const PRICE_LEVELS: [&str; 4] = ["$", "$$", "$$$", "$$$$"];

/// Weather, country and attractions lookups with one TTL cache per source.
pub struct ExternalDataGateway {
    weather: Arc<dyn WeatherProvider>,
    countries: Arc<dyn CountryProvider>,
    places: Arc<dyn PlacesProvider>,
    weather_cache: TtlCache<WeatherData>,
    country_cache: TtlCache<CountryData>,
    attractions_cache: TtlCache<AttractionsData>,
    decorate: bool,
}

impl ExternalDataGateway {
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        countries: Arc<dyn CountryProvider>,
        places: Arc<dyn PlacesProvider>,
        ttl: Duration,
    ) -> Self {
        Self {
            weather,
            countries,
            places,
            weather_cache: TtlCache::new(ttl),
            country_cache: TtlCache::new(ttl),
            attractions_cache: TtlCache::new(ttl),
            decorate: false,
        }
    }

    /// Enable the estimated rating and price level on attraction results.
    pub fn with_decorations(mut self, decorate: bool) -> Self {
        self.decorate = decorate;
        self
    }

    /// Build the gateway with the HTTP providers described by `config`.
    pub fn from_config(config: &WayfarerConfig) -> Result<Self, DataError> {
        let http = http_client(Duration::from_secs(config.general.http_timeout_secs))?;
        let gateway = Self::new(
            Arc::new(OpenWeatherClient::new(http.clone(), &config.weather)),
            Arc::new(RestCountriesClient::new(http.clone(), &config.country)),
            Arc::new(OpenTripMapClient::new(http, &config.places)),
            Duration::from_secs(config.cache.ttl_secs),
        )
        .with_decorations(config.places.estimate_decorations);

        if config.weather.api_key.is_none() {
            tracing::warn!("No weather API key configured; weather lookups will be unavailable");
        }
        if config.places.api_key.is_none() {
            tracing::warn!("No places API key configured; attractions will be unavailable");
        }
        Ok(gateway)
    }

    /// Current weather for `location`, served from cache within the TTL.
    pub async fn get_weather(&self, location: &str) -> Option<WeatherData> {
        let location = location.trim();
        if location.is_empty() {
            return None;
        }
        if let Some(hit) = self.weather_cache.get(location) {
            tracing::debug!(location, "Weather cache hit");
            return Some(hit);
        }

        match self.weather.current_weather(location).await {
            Ok(data) => {
                self.weather_cache.insert(location, data.clone());
                Some(data)
            }
            Err(e) => {
                log_failure("weather", location, &e);
                None
            }
        }
    }

    /// Country facts for `name`, served from cache within the TTL.
    pub async fn get_country_info(&self, name: &str) -> Option<CountryData> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(hit) = self.country_cache.get(name) {
            tracing::debug!(country = name, "Country cache hit");
            return Some(hit);
        }

        match self.countries.country(name).await {
            Ok(data) => {
                self.country_cache.insert(name, data.clone());
                Some(data)
            }
            Err(e) => {
                log_failure("country", name, &e);
                None
            }
        }
    }

    /// Ranked attractions, restaurants and hotels near `destination`.
    ///
    /// Returns `None` when the destination cannot be geocoded or every
    /// category search fails. A single failed category yields an empty list.
    pub async fn get_attractions(&self, destination: &str) -> Option<AttractionsData> {
        let destination = destination.trim();
        if destination.is_empty() {
            return None;
        }
        if let Some(hit) = self.attractions_cache.get(destination) {
            tracing::debug!(destination, "Attractions cache hit");
            return Some(hit);
        }

        let center = match self.places.geocode(destination).await {
            Ok(point) => point,
            Err(e) => {
                log_failure("geocode", destination, &e);
                return None;
            }
        };

        let (attractions, restaurants, hotels) = tokio::join!(
            self.places.nearby(center, PlaceCategory::Attractions),
            self.places.nearby(center, PlaceCategory::Restaurants),
            self.places.nearby(center, PlaceCategory::Hotels),
        );

        if attractions.is_err() && restaurants.is_err() && hotels.is_err() {
            tracing::warn!(destination, "All place searches failed");
            return None;
        }

        let data = AttractionsData {
            destination: destination.to_string(),
            top_attractions: self.finish(destination, PlaceCategory::Attractions, attractions),
            restaurants: self.finish(destination, PlaceCategory::Restaurants, restaurants),
            hotels: self.finish(destination, PlaceCategory::Hotels, hotels),
        };
        tracing::info!(destination, places = data.total(), "Fetched attractions");

        self.attractions_cache.insert(destination, data.clone());
        Some(data)
    }

    fn finish(
        &self,
        destination: &str,
        category: PlaceCategory,
        result: Result<Vec<Place>, DataError>,
    ) -> Vec<Place> {
        let mut places = match result {
            Ok(places) => places,
            Err(e) => {
                tracing::warn!(
                    destination,
                    category = category.as_str(),
                    error = %e,
                    "Place search failed"
                );
                return Vec::new();
            }
        };

        rank_places(&mut places);
        if self.decorate {
            decorate_places(&mut places, category);
        }
        places
    }
}

fn log_failure(source: &str, query: &str, error: &DataError) {
    match error {
        DataError::NotFound(_) => tracing::info!(source, query, "No upstream match"),
        _ => tracing::warn!(source, query, error = %error, "Upstream lookup failed"),
    }
}

/// Order by popularity (highest first), then distance (nearest first).
fn rank_places(places: &mut [Place]) {
    places.sort_by(|a, b| {
        b.popularity.cmp(&a.popularity).then_with(|| {
            match (a.distance_m, b.distance_m) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        })
    });
}

/// Attach estimated ratings, plus price levels for restaurants and hotels.
fn decorate_places(places: &mut [Place], category: PlaceCategory) {
    let mut rng = rand::rng();
    for place in places.iter_mut() {
        let rating: f32 = rng.random_range(3.5..=5.0);
        place.estimated_rating = Some((rating * 10.0).round() / 10.0);
        if category != PlaceCategory::Attractions {
            let level = PRICE_LEVELS[rng.random_range(0..PRICE_LEVELS.len())];
            place.price_level = Some(level.to_string());
        }
    }
}
