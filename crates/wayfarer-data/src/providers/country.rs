//! REST Countries client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use wayfarer_core::config::CountryConfig;
use wayfarer_core::types::CountryData;

use super::{read_success_body, CountryProvider};
use crate::error::DataError;

/// HTTP client for the REST Countries `/name/{name}` endpoint.
pub struct RestCountriesClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestCountriesClient {
    pub fn new(http: reqwest::Client, config: &CountryConfig) -> Self {
        Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }

    fn lookup_url(&self, name: &str) -> Result<reqwest::Url, DataError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| DataError::InvalidRequest(format!("bad country api_url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| DataError::InvalidRequest("country api_url cannot be a base".to_string()))?
            .push("name")
            .push(name.trim());
        Ok(url)
    }
}

#[async_trait]
impl CountryProvider for RestCountriesClient {
    async fn country(&self, name: &str) -> Result<CountryData, DataError> {
        let url = self.lookup_url(name)?;
        let response = self.http.get(url).send().await?;
        let body = read_success_body(response, name).await?;
        shape_country(name, &body)
    }
}

#[derive(Debug, Deserialize)]
struct RcCountry {
    name: RcName,
    #[serde(default)]
    capital: Vec<String>,
    #[serde(default)]
    population: u64,
    #[serde(default)]
    currencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    languages: BTreeMap<String, String>,
    #[serde(default)]
    region: String,
    #[serde(default)]
    subregion: Option<String>,
    #[serde(default)]
    timezones: Vec<String>,
    #[serde(default)]
    flags: Option<RcFlags>,
}

#[derive(Debug, Deserialize)]
struct RcName {
    common: String,
}

#[derive(Debug, Deserialize)]
struct RcFlags {
    svg: Option<String>,
}

/// Shape a REST Countries body (an array of matches) into [`CountryData`].
///
/// The first match is used, as the provider orders by relevance.
pub(crate) fn shape_country(query: &str, body: &str) -> Result<CountryData, DataError> {
    let matches: Vec<RcCountry> =
        serde_json::from_str(body).map_err(|e| DataError::Malformed(e.to_string()))?;

    let country = matches
        .into_iter()
        .next()
        .ok_or_else(|| DataError::NotFound(query.to_string()))?;

    Ok(CountryData {
        name: country.name.common,
        capital: country.capital.into_iter().next(),
        population: country.population,
        currencies: country.currencies.into_keys().collect(),
        languages: country.languages.into_values().collect(),
        region: country.region,
        subregion: country.subregion,
        timezones: country.timezones,
        flag: country.flags.and_then(|f| f.svg),
    })
}
