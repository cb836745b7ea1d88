//! OpenTripMap points-of-interest client.

use async_trait::async_trait;
use serde::Deserialize;

use wayfarer_core::config::PlacesConfig;
use wayfarer_core::types::Place;

use super::{read_success_body, GeoPoint, PlaceCategory, PlacesProvider};
use crate::error::DataError;

/// HTTP client for the OpenTripMap `places` API.
pub struct OpenTripMapClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    radius_m: u32,
    limit: u32,
}

impl OpenTripMapClient {
    pub fn new(http: reqwest::Client, config: &PlacesConfig) -> Self {
        Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            radius_m: config.radius_m,
            limit: config.limit,
        }
    }

    fn api_key(&self) -> Result<&str, DataError> {
        self.api_key
            .as_deref()
            .ok_or(DataError::MissingApiKey("places"))
    }
}

#[async_trait]
impl PlacesProvider for OpenTripMapClient {
    async fn geocode(&self, destination: &str) -> Result<GeoPoint, DataError> {
        let api_key = self.api_key()?;
        let response = self
            .http
            .get(format!("{}/places/geoname", self.base_url))
            .query(&[("name", destination.trim()), ("apikey", api_key)])
            .send()
            .await?;

        let body = read_success_body(response, destination).await?;
        shape_geoname(destination, &body)
    }

    async fn nearby(
        &self,
        center: GeoPoint,
        category: PlaceCategory,
    ) -> Result<Vec<Place>, DataError> {
        let api_key = self.api_key()?;
        let response = self
            .http
            .get(format!("{}/places/radius", self.base_url))
            .query(&[
                ("radius", self.radius_m.to_string()),
                ("lon", center.lon.to_string()),
                ("lat", center.lat.to_string()),
                ("kinds", category.kinds().to_string()),
                ("format", "json".to_string()),
                ("limit", self.limit.to_string()),
                ("apikey", api_key.to_string()),
            ])
            .send()
            .await?;

        let body = read_success_body(response, category.as_str()).await?;
        shape_places(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OtmGeoname {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OtmPlace {
    #[serde(default)]
    name: String,
    #[serde(default)]
    dist: Option<f64>,
    #[serde(default)]
    rate: Option<serde_json::Value>,
    #[serde(default)]
    kinds: String,
    point: OtmPoint,
}

#[derive(Debug, Deserialize)]
struct OtmPoint {
    lon: f64,
    lat: f64,
}

fn shape_geoname(destination: &str, body: &str) -> Result<GeoPoint, DataError> {
    let raw: OtmGeoname =
        serde_json::from_str(body).map_err(|e| DataError::Malformed(e.to_string()))?;
    match (raw.lat, raw.lon) {
        (Some(lat), Some(lon)) => Ok(GeoPoint { lat, lon }),
        _ => Err(DataError::NotFound(destination.to_string())),
    }
}

/// Shape a radius-search body into places, skipping unnamed entries.
pub(crate) fn shape_places(body: &str) -> Result<Vec<Place>, DataError> {
    let raw: Vec<OtmPlace> =
        serde_json::from_str(body).map_err(|e| DataError::Malformed(e.to_string()))?;

    Ok(raw
        .into_iter()
        .filter(|p| !p.name.trim().is_empty())
        .map(|p| Place {
            name: p.name.trim().to_string(),
            latitude: p.point.lat,
            longitude: p.point.lon,
            kinds: p
                .kinds
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
            popularity: p.rate.as_ref().and_then(parse_rate),
            distance_m: p.dist,
            estimated_rating: None,
            price_level: None,
        })
        .collect())
}

/// OpenTripMap reports `rate` as a number or as a string like `"3h"`.
fn parse_rate(value: &serde_json::Value) -> Option<u8> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        serde_json::Value::String(s) => s
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_places() {
        let body = r#"[
            {"xid":"W1","name":"Louvre Museum","dist":412.5,"rate":7,
             "kinds":"museums,cultural,interesting_places","point":{"lon":2.3376,"lat":48.8606}},
            {"xid":"W2","name":"","dist":10.0,"rate":1,"kinds":"other","point":{"lon":2.0,"lat":48.0}},
            {"xid":"W3","name":"Sainte-Chapelle","dist":900.0,"rate":"3h",
             "kinds":"churches","point":{"lon":2.345,"lat":48.855}}
        ]"#;
        let places = shape_places(body).unwrap();
        assert_eq!(places.len(), 2);

        assert_eq!(places[0].name, "Louvre Museum");
        assert_eq!(places[0].kinds, vec!["museums", "cultural", "interesting_places"]);
        assert_eq!(places[0].popularity, Some(7));
        assert_eq!(places[0].distance_m, Some(412.5));
        assert!(places[0].estimated_rating.is_none());

        assert_eq!(places[1].popularity, Some(3));
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate(&json!(2)), Some(2));
        assert_eq!(parse_rate(&json!("1h")), Some(1));
        assert_eq!(parse_rate(&json!("h")), None);
        assert_eq!(parse_rate(&json!(null)), None);
        assert_eq!(parse_rate(&json!(1000)), None);
    }

    #[test]
    fn test_shape_geoname() {
        let body = r#"{"name":"Paris","country":"FR","lat":48.85341,"lon":2.3488,"status":"OK"}"#;
        let point = shape_geoname("Paris", body).unwrap();
        assert_eq!(point.lat, 48.85341);
        assert_eq!(point.lon, 2.3488);
    }

    #[test]
    fn test_shape_geoname_unknown_is_not_found() {
        let body = r#"{"error":"Not found","status":"NOT_FOUND"}"#;
        assert!(matches!(
            shape_geoname("Nowhere", body),
            Err(DataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let client = OpenTripMapClient::new(reqwest::Client::new(), &PlacesConfig::default());
        let result = client.geocode("Paris").await;
        assert!(matches!(result, Err(DataError::MissingApiKey("places"))));
    }
}
