//! OpenWeatherMap current-weather client.

use async_trait::async_trait;
use serde::Deserialize;

use wayfarer_core::config::WeatherConfig;
use wayfarer_core::types::WeatherData;

use super::{read_success_body, WeatherProvider};
use crate::error::DataError;

/// HTTP client for the OpenWeatherMap `/weather` endpoint.
pub struct OpenWeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    units: String,
}

impl OpenWeatherClient {
    pub fn new(http: reqwest::Client, config: &WeatherConfig) -> Self {
        Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            units: config.units.clone(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current_weather(&self, location: &str) -> Result<WeatherData, DataError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(DataError::MissingApiKey("weather"))?;

        let response = self
            .http
            .get(format!("{}/weather", self.base_url))
            .query(&[("q", location), ("appid", api_key), ("units", &self.units)])
            .send()
            .await?;

        let body = read_success_body(response, location).await?;
        shape_weather(location, &body)
    }
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: Option<OwmWind>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

/// Shape a raw OpenWeatherMap body into [`WeatherData`].
pub(crate) fn shape_weather(location: &str, body: &str) -> Result<WeatherData, DataError> {
    let raw: OwmResponse =
        serde_json::from_str(body).map_err(|e| DataError::Malformed(e.to_string()))?;

    let condition = raw
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| DataError::Malformed("no weather conditions in response".to_string()))?;

    Ok(WeatherData {
        location: location.trim().to_string(),
        temperature: raw.main.temp,
        description: condition.description,
        humidity: raw.main.humidity,
        wind_speed: raw.wind.map(|w| w.speed).unwrap_or(0.0),
        icon: condition.icon,
    })
}
