use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Conversation
// =============================================================================

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a session. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// Travel request category chosen by the classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Destination,
    Planning,
    Itinerary,
    Packing,
    #[default]
    General,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Destination,
        Category::Planning,
        Category::Itinerary,
        Category::Packing,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Destination => "destination",
            Category::Planning => "planning",
            Category::Itinerary => "itinerary",
            Category::Packing => "packing",
            Category::General => "general",
        }
    }

    /// Parse a category name, case-insensitively. Unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw))
    }

    /// Parse a category name, substituting `General` for anything invalid.
    pub fn parse_or_general(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or_default()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External lookup the classifier decided on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionChoice {
    #[serde(rename = "get_weather")]
    GetWeather,
    #[serde(rename = "get_country_info")]
    GetCountryInfo,
    #[default]
    #[serde(rename = "none")]
    None,
}

impl FunctionChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionChoice::GetWeather => "get_weather",
            FunctionChoice::GetCountryInfo => "get_country_info",
            FunctionChoice::None => "none",
        }
    }

    /// Parse a function name, substituting `None` for anything invalid.
    ///
    /// Accepts both the snake_case wire names and the camelCase spellings
    /// models sometimes echo back.
    pub fn parse_or_none(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("get_weather") | Some("getweather") => FunctionChoice::GetWeather,
            Some("get_country_info") | Some("getcountryinfo") => FunctionChoice::GetCountryInfo,
            _ => FunctionChoice::None,
        }
    }
}

impl fmt::Display for FunctionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments for the chosen lookup. Empty strings mean "unknown".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionArgs {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

/// Per-request classification and lookup decision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub category: Category,
    pub city: Option<String>,
    pub country: Option<String>,
    pub function_to_call: FunctionChoice,
    pub function_args: FunctionArgs,
}

impl AnalysisResult {
    /// The maximally conservative decision: general, no entities, no lookup.
    pub fn conservative_default() -> Self {
        Self::default()
    }
}

// =============================================================================
// External data
// =============================================================================

/// Current weather for a location, in the units the gateway was configured with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    pub location: String,
    pub temperature: f64,
    pub description: String,
    pub humidity: f64,
    pub wind_speed: f64,
    pub icon: String,
}

/// Country facts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryData {
    pub name: String,
    pub capital: Option<String>,
    pub population: u64,
    pub currencies: Vec<String>,
    pub languages: Vec<String>,
    pub region: String,
    pub subregion: Option<String>,
    pub timezones: Vec<String>,
    pub flag: Option<String>,
}

/// A named place near a destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub kinds: Vec<String>,
    /// Provider popularity rank (higher is more notable), when supplied.
    pub popularity: Option<u8>,
    pub distance_m: Option<f64>,
    /// Estimated rating. Not sourced from the provider.
    pub estimated_rating: Option<f32>,
    /// Estimated price level ("$" to "$$$$"). Not sourced from the provider.
    pub price_level: Option<String>,
}

/// Ranked points of interest for a destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttractionsData {
    pub destination: String,
    pub top_attractions: Vec<Place>,
    pub restaurants: Vec<Place>,
    pub hotels: Vec<Place>,
}

impl AttractionsData {
    pub fn total(&self) -> usize {
        self.top_attractions.len() + self.restaurants.len() + self.hotels.len()
    }
}

/// Data fetched for a single request.
///
/// A missing field means "not fetched", never "fetched and empty".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalDataBag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<CountryData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attractions: Option<AttractionsData>,
}

impl ExternalDataBag {
    pub fn is_empty(&self) -> bool {
        self.weather.is_none() && self.country.is_none() && self.attractions.is_none()
    }

    /// Names of the sources present in the bag.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.weather.is_some() {
            keys.push("weather");
        }
        if self.country.is_some() {
            keys.push("country");
        }
        if self.attractions.is_some() {
            keys.push("attractions");
        }
        keys
    }

    /// Merge `fresh` over `self`; entries present in `fresh` win.
    pub fn merge(self, fresh: ExternalDataBag) -> ExternalDataBag {
        ExternalDataBag {
            weather: fresh.weather.or(self.weather),
            country: fresh.country.or(self.country),
            attractions: fresh.attractions.or(self.attractions),
        }
    }
}
