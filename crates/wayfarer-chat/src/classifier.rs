//! Intent classification and external-function planning.
//!
//! Classification is an ordered chain of strategies. The LLM strategy asks
//! the model for a structured `analyze_travel_request` call; the keyword
//! strategy scans the raw text. The first strategy to succeed wins, and if
//! every strategy fails the conservative default is used. [`IntentClassifier::analyze`]
//! therefore never fails.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use wayfarer_core::error::WayfarerError;
use wayfarer_core::types::{AnalysisResult, Category, ConversationTurn, FunctionArgs, FunctionChoice};

use crate::error::LlmError;
use crate::extractor::DestinationExtractor;
use crate::llm::{
    FunctionCall, FunctionDeclaration, GenerationParams, GenerationRequest, LlmClient, LlmReply,
};
use crate::prompts::PromptLibrary;

/// Name of the single structured-decision function offered to the model.
pub const ANALYZE_FUNCTION: &str = "analyze_travel_request";

// =============================================================================
// Compiled regexes
// =============================================================================

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*-?\s*(?:day|week)").unwrap());

/// Capitalised place name, possibly several words ("New York").
const PLACE: &str = r"[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*";

struct CityPatterns {
    /// "City, Country" only after a preposition, so a greeting such as
    /// "Hello, Maria" is not read as a place.
    city_country: Regex,
    in_city: Regex,
    weather_in: Regex,
    city_weather: Regex,
}

static CITY_PATTERNS: LazyLock<CityPatterns> = LazyLock::new(|| CityPatterns {
    city_country: Regex::new(&format!(
        r"\b(?i:in|to|for|at|near|visit|visiting)\s+({PLACE})\s*,\s*({PLACE})"
    ))
    .unwrap(),
    in_city: Regex::new(&format!(r"\bin\s+({PLACE})")).unwrap(),
    weather_in: Regex::new(&format!(r"(?i:weather)\s+(?:in|like)\s+({PLACE})")).unwrap(),
    city_weather: Regex::new(&format!(r"({PLACE})\s+(?i:weather|temperature)")).unwrap(),
});

// =============================================================================
// Strategy chain
// =============================================================================

/// Why a strategy produced no decision.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Template(#[from] WayfarerError),
    #[error("model answered with text instead of a function call")]
    TextInsteadOfCall,
    #[error("model called unknown function `{0}`")]
    UnknownFunction(String),
    #[error("nothing to classify")]
    BlankMessage,
}

/// One way of producing an [`AnalysisResult`].
#[async_trait]
pub trait ClassificationStrategy: Send + Sync {
    /// Stage label used in logs.
    fn name(&self) -> &'static str;

    async fn classify(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<AnalysisResult, StrategyError>;
}

/// Runs strategies in order until one succeeds.
pub struct IntentClassifier {
    strategies: Vec<Box<dyn ClassificationStrategy>>,
}

impl IntentClassifier {
    /// LLM strategy first, keyword heuristic second.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        params: GenerationParams,
    ) -> Self {
        Self::with_strategies(vec![
            Box::new(LlmStrategy::new(llm, prompts, params)),
            Box::new(KeywordStrategy::default()),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ClassificationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Classify `message`. Never fails; falls back to the conservative default.
    pub async fn analyze(&self, message: &str, history: &[ConversationTurn]) -> AnalysisResult {
        for strategy in &self.strategies {
            match strategy.classify(message, history).await {
                Ok(result) => {
                    tracing::info!(
                        stage = strategy.name(),
                        category = %result.category,
                        function = %result.function_to_call,
                        city = result.city.as_deref().unwrap_or(""),
                        country = result.country.as_deref().unwrap_or(""),
                        "Message classified"
                    );
                    return result;
                }
                Err(e) => {
                    tracing::warn!(
                        stage = strategy.name(),
                        error = %e,
                        "Classification strategy failed, falling through"
                    );
                }
            }
        }
        tracing::warn!("All classification strategies failed, using conservative default");
        AnalysisResult::conservative_default()
    }
}

// =============================================================================
// LLM strategy
// =============================================================================

/// Asks the model for a structured `analyze_travel_request` call.
pub struct LlmStrategy {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    params: GenerationParams,
}

impl LlmStrategy {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>, params: GenerationParams) -> Self {
        Self {
            llm,
            prompts,
            params,
        }
    }
}

#[async_trait]
impl ClassificationStrategy for LlmStrategy {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn classify(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<AnalysisResult, StrategyError> {
        let prompt = self.prompts.build_classification(message, history)?;
        let request = GenerationRequest::with_functions(
            prompt,
            self.params,
            vec![analyze_travel_request_declaration()],
        );

        match self.llm.generate(&request).await? {
            LlmReply::FunctionCall(call) => analysis_from_call(&call),
            LlmReply::Text(_) => Err(StrategyError::TextInsteadOfCall),
        }
    }
}

/// Declaration of the structured-decision function.
pub fn analyze_travel_request_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: ANALYZE_FUNCTION.to_string(),
        description: "Classify the user's travel question, extract entities, and decide which \
                      external data to fetch if needed. Use empty strings for unknown values."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "enum": Category::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>()
                },
                "city": { "type": "string" },
                "country": { "type": "string" },
                "function_to_call": {
                    "type": "string",
                    "enum": ["get_weather", "get_country_info", "none"]
                },
                "function_args": {
                    "type": "object",
                    "properties": {
                        "city": {
                            "type": "string",
                            "description": "City name for weather lookups. Empty if unknown."
                        },
                        "country": {
                            "type": "string",
                            "description": "Country name for country lookups. Empty if unknown."
                        }
                    }
                }
            },
            "required": ["category"]
        }),
    }
}

/// Validate a structured call into an [`AnalysisResult`].
///
/// Invalid or absent `category` becomes `general`, invalid or absent
/// `function_to_call` becomes `none`. Empty `function_args` values fall back
/// to the top-level `city` and `country`.
pub fn analysis_from_call(call: &FunctionCall) -> Result<AnalysisResult, StrategyError> {
    if call.name != ANALYZE_FUNCTION {
        return Err(StrategyError::UnknownFunction(call.name.clone()));
    }

    let args = &call.args;
    let category = Category::parse_or_general(args.get("category").and_then(Value::as_str));
    let function_to_call =
        FunctionChoice::parse_or_none(args.get("function_to_call").and_then(Value::as_str));
    let city = non_blank(args.get("city"));
    let country = non_blank(args.get("country"));

    let fn_args = args.get("function_args");
    let function_args = FunctionArgs {
        city: non_blank(fn_args.and_then(|a| a.get("city")))
            .or_else(|| city.clone())
            .unwrap_or_default(),
        country: non_blank(fn_args.and_then(|a| a.get("country")))
            .or_else(|| country.clone())
            .unwrap_or_default(),
    };

    Ok(AnalysisResult {
        category,
        city,
        country,
        function_to_call,
        function_args,
    })
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(String::from)
}

// =============================================================================
// Keyword strategy
// =============================================================================

/// Substring and regex heuristic over the raw message.
#[derive(Debug, Clone, Default)]
pub struct KeywordStrategy {
    extractor: DestinationExtractor,
}

impl KeywordStrategy {
    pub fn new(extractor: DestinationExtractor) -> Self {
        Self { extractor }
    }

    /// Heuristic analysis. `None` only for a blank message.
    pub fn analyze(&self, message: &str) -> Option<AnalysisResult> {
        if message.trim().is_empty() {
            return None;
        }
        let lower = message.to_lowercase();
        let category = keyword_category(&lower);

        let is_weather = ["weather", "temperature", "climate"]
            .iter()
            .any(|k| lower.contains(k));

        let (city, country) = if is_weather {
            match extract_city_country(message) {
                Some((city, country)) => (Some(city), country),
                None => (self.extractor.extract(message).map(String::from), None),
            }
        } else {
            (self.extractor.extract(message).map(String::from), None)
        };

        let function_to_call = if is_weather {
            FunctionChoice::GetWeather
        } else {
            FunctionChoice::None
        };

        Some(AnalysisResult {
            category,
            function_args: FunctionArgs {
                city: city.clone().unwrap_or_default(),
                country: country.clone().unwrap_or_default(),
            },
            city,
            country,
            function_to_call,
        })
    }
}

#[async_trait]
impl ClassificationStrategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn classify(
        &self,
        message: &str,
        _history: &[ConversationTurn],
    ) -> Result<AnalysisResult, StrategyError> {
        self.analyze(message).ok_or(StrategyError::BlankMessage)
    }
}

/// Category from lower-cased text. Itinerary, planning, destination and
/// packing are checked in that order; the first match wins.
pub fn keyword_category(lower: &str) -> Category {
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["itinerary", "schedule"]) || DURATION_RE.is_match(lower) {
        Category::Itinerary
    } else if has(&["plan", "organize", "logistics"]) {
        Category::Planning
    } else if has(&["recommend", "suggest", "where"]) {
        Category::Destination
    } else if has(&["pack", "bring", "luggage"]) {
        Category::Packing
    } else {
        Category::General
    }
}

/// City (and country, for "City, Country") from capitalised words in `text`.
fn extract_city_country(text: &str) -> Option<(String, Option<String>)> {
    let p = &*CITY_PATTERNS;

    if let Some(caps) = p.city_country.captures(text) {
        return Some((caps[1].to_string(), Some(caps[2].to_string())));
    }
    [&p.in_city, &p.weather_in, &p.city_weather]
        .into_iter()
        .find_map(|re| re.captures(text))
        .map(|caps| (caps[1].to_string(), None))
}
