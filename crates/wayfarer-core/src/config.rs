use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Top-level configuration for the Wayfarer service.
///
/// Loaded from a TOML file; every section falls back to its defaults so a
/// partial file (or none at all) is valid. Secrets are normally supplied
/// through the environment, see [`WayfarerConfig::apply_env_overrides`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WayfarerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub country: CountryConfig,
    #[serde(default)]
    pub places: PlacesConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub augmentation: AugmentationConfig,
}

impl WayfarerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WayfarerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, using defaults when the file does
    /// not exist. A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Override secrets and endpoints from process environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Override secrets and endpoints using an arbitrary lookup.
    ///
    /// Empty values are ignored so an exported-but-blank variable does not
    /// wipe a key set in the file.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("GEMINI_API_URL") {
            self.llm.api_url = url;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = get("WEATHER_API_KEY") {
            self.weather.api_key = Some(key);
        }
        if let Some(key) = get("PLACES_API_KEY") {
            self.places.api_key = Some(key);
        }
        if let Some(port) = get("PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid PORT override"),
            }
        }
    }
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Timeout applied to every outbound data-provider request.
    pub http_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            http_timeout_secs: 10,
        }
    }
}

/// Inbound HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Requests per second accepted on the chat and data routes.
    pub rate_limit_per_sec: u64,
    /// Maximum accepted chat message length in characters.
    pub max_message_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            rate_limit_per_sec: 50,
            max_message_length: 4000,
        }
    }
}

/// Text-generation provider settings (Gemini generateContent).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Endpoint URL. A `{model}` placeholder is replaced with `model`.
    pub api_url: String,
    pub model: String,
    /// API key. Absence is only reported when the first request is made.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            api_key: None,
            temperature: 0.7,
            max_output_tokens: 1000,
            top_p: 0.9,
            top_k: 40,
            timeout_secs: 30,
        }
    }
}

/// Weather provider settings (OpenWeatherMap current weather).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Unit system passed to the provider: "metric" or "imperial".
    pub units: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openweathermap.org/data/2.5".to_string(),
            api_key: None,
            units: "metric".to_string(),
        }
    }
}

/// Country facts provider settings (REST Countries).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryConfig {
    pub api_url: String,
}

impl Default for CountryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://restcountries.com/v3.1".to_string(),
        }
    }
}

/// Points-of-interest provider settings (OpenTripMap).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Search radius around the destination centre, in metres.
    pub radius_m: u32,
    /// Maximum places returned per sub-query.
    pub limit: u32,
    /// Attach estimated rating and price level to each place.
    pub estimate_decorations: bool,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.opentripmap.com/0.1/en".to_string(),
            api_key: None,
            radius_m: 5000,
            limit: 10,
            estimate_decorations: true,
        }
    }
}

/// Provider response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 30 * 60 }
    }
}

/// Conversation context store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Maximum turns retained per session (user and assistant turns count separately).
    pub max_turns: usize,
    /// Seconds of inactivity after which a session is forgotten.
    pub idle_ttl_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: 50,
            idle_ttl_secs: 60 * 60,
        }
    }
}

/// Prompt template location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub dir: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: "prompts".to_string(),
        }
    }
}

/// Optional data augmentation beyond what the classifier asks for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Fetch points of interest for destination and itinerary requests
    /// that name a city.
    pub attractions: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WayfarerError;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = WayfarerConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.llm.max_output_tokens, 1000);
        assert_eq!(config.llm.top_k, 40);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.weather.units, "metric");
        assert_eq!(config.cache.ttl_secs, 1800);
        assert_eq!(config.conversation.max_turns, 50);
        assert_eq!(config.conversation.idle_ttl_secs, 3600);
        assert_eq!(config.prompts.dir, "prompts");
        assert!(!config.augmentation.attractions);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[server]
host = "0.0.0.0"
port = 8080
allowed_origins = []

[llm]
model = "gemini-1.5-pro"
temperature = 0.2

[conversation]
max_turns = 10
idle_ttl_secs = 600

[augmentation]
attractions = true
"#;
        let file = create_temp_config(content);
        let config = WayfarerConfig::load(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.allowed_origins.is_empty());
        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.conversation.max_turns, 10);
        assert!(config.augmentation.attractions);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = WayfarerConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.http_timeout_secs, 10);
        assert_eq!(config.cache.ttl_secs, 1800);
        assert_eq!(config.places.radius_m, 5000);
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let file = create_temp_config("[server\nport = ");
        let result = WayfarerConfig::load(file.path());
        assert!(matches!(result, Err(WayfarerError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config =
            WayfarerConfig::load_or_default(Path::new("/nonexistent/wayfarer.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_load_or_default_reports_invalid_file() {
        let file = create_temp_config("[conversation]\nmax_turns = \"many\"\n");
        let result = WayfarerConfig::load_or_default(file.path());
        assert!(matches!(result, Err(WayfarerError::Config(_))));
    }

    #[test]
    fn test_load_or_default_reads_existing_file() {
        let file = create_temp_config("[server]\nport = 8088\n");
        let config = WayfarerConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.server.port, 8088);
    }

    #[test]
    fn test_overrides_apply_secrets_and_port() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GEMINI_API_KEY", "gem-key"),
            ("GEMINI_MODEL", "gemini-exp"),
            ("WEATHER_API_KEY", "owm-key"),
            ("PLACES_API_KEY", "otm-key"),
            ("PORT", "4100"),
        ]);
        let mut config = WayfarerConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("gem-key"));
        assert_eq!(config.llm.model, "gemini-exp");
        assert_eq!(config.weather.api_key.as_deref(), Some("owm-key"));
        assert_eq!(config.places.api_key.as_deref(), Some("otm-key"));
        assert_eq!(config.server.port, 4100);
    }

    #[test]
    fn test_overrides_ignore_blank_and_invalid_values() {
        let env: HashMap<&str, &str> = HashMap::from([("GEMINI_API_KEY", "  "), ("PORT", "abc")]);
        let mut config = WayfarerConfig::default();
        config.llm.api_key = Some("from-file".to_string());
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.server.port, 3000);
    }
}
