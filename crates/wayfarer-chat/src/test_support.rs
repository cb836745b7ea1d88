//! Test doubles shared by the unit tests in this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wayfarer_core::types::{CountryData, Place, WeatherData};
use wayfarer_data::{
    CountryProvider, DataError, ExternalDataGateway, GeoPoint, PlaceCategory, PlacesProvider,
    WeatherProvider,
};

use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmClient, LlmReply};

type Responder = Box<dyn Fn(&GenerationRequest) -> Result<LlmReply, LlmError> + Send + Sync>;

/// LLM stub that answers structured-decision requests with `classify` and
/// plain-text requests with `generate`, recording every request.
pub struct ScriptedLlm {
    classify: Responder,
    generate: Responder,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedLlm {
    pub fn new<C, G>(classify: C, generate: G) -> Self
    where
        C: Fn(&GenerationRequest) -> Result<LlmReply, LlmError> + Send + Sync + 'static,
        G: Fn(&GenerationRequest) -> Result<LlmReply, LlmError> + Send + Sync + 'static,
    {
        Self {
            classify: Box::new(classify),
            generate: Box::new(generate),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmReply, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if request.wants_function_call() {
            (self.classify)(request)
        } else {
            (self.generate)(request)
        }
    }
}

/// Responder that always answers with `text`.
pub fn text_reply(
    text: &str,
) -> impl Fn(&GenerationRequest) -> Result<LlmReply, LlmError> + Send + Sync + 'static {
    let text = text.to_string();
    move |_| Ok(LlmReply::Text(text.clone()))
}

/// Weather stub; fails when `fail` is set.
pub struct StubWeather {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl StubWeather {
    pub fn new(fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for StubWeather {
    async fn current_weather(&self, location: &str) -> Result<WeatherData, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DataError::status(503, "weather service down"));
        }
        Ok(WeatherData {
            location: location.to_string(),
            temperature: 21.0,
            description: "clear sky".to_string(),
            humidity: 50.0,
            wind_speed: 2.5,
            icon: "01d".to_string(),
        })
    }
}

/// Country stub that knows every country as itself.
pub struct StubCountries {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CountryProvider for StubCountries {
    async fn country(&self, name: &str) -> Result<CountryData, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CountryData {
            name: name.to_string(),
            capital: None,
            population: 1_000_000,
            currencies: vec!["EUR".to_string()],
            languages: vec!["French".to_string()],
            region: "Europe".to_string(),
            subregion: None,
            timezones: vec!["UTC+01:00".to_string()],
            flag: None,
        })
    }
}

/// Places stub returning one place per category.
pub struct StubPlaces {
    pub geocode_calls: AtomicUsize,
}

#[async_trait]
impl PlacesProvider for StubPlaces {
    async fn geocode(&self, _destination: &str) -> Result<GeoPoint, DataError> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeoPoint { lat: 35.68, lon: 139.69 })
    }

    async fn nearby(
        &self,
        center: GeoPoint,
        category: PlaceCategory,
    ) -> Result<Vec<Place>, DataError> {
        Ok(vec![Place {
            name: format!("Best {}", category.as_str()),
            latitude: center.lat,
            longitude: center.lon,
            kinds: vec![category.kinds().to_string()],
            popularity: Some(3),
            distance_m: Some(250.0),
            estimated_rating: None,
            price_level: None,
        }])
    }
}

/// Providers plus a gateway built over them.
pub struct StubData {
    pub weather: Arc<StubWeather>,
    pub countries: Arc<StubCountries>,
    pub places: Arc<StubPlaces>,
    pub gateway: Arc<ExternalDataGateway>,
}

impl StubData {
    pub fn new(weather_fails: bool) -> Self {
        let weather = Arc::new(StubWeather::new(weather_fails));
        let countries = Arc::new(StubCountries {
            calls: AtomicUsize::new(0),
        });
        let places = Arc::new(StubPlaces {
            geocode_calls: AtomicUsize::new(0),
        });
        let gateway = Arc::new(ExternalDataGateway::new(
            weather.clone(),
            countries.clone(),
            places.clone(),
            std::time::Duration::from_secs(1800),
        ));
        Self {
            weather,
            countries,
            places,
            gateway,
        }
    }
}
