//! Chat orchestrator: runs one message through classification, data lookup,
//! prompt construction and final generation.

use std::sync::Arc;

use wayfarer_core::types::{Category, ConversationTurn, ExternalDataBag};
use wayfarer_data::ExternalDataGateway;

use crate::classifier::IntentClassifier;
use crate::context::ConversationStore;
use crate::error::{ChatError, LlmError};
use crate::executor::FunctionExecutor;
use crate::extractor::DestinationExtractor;
use crate::llm::{GenerationParams, GenerationRequest, LlmClient};
use crate::prompts::{PromptKind, PromptLibrary};

/// Reply returned whenever a message cannot be answered.
pub const APOLOGY_MESSAGE: &str = "I apologize, but I'm having trouble processing your request \
                                   right now. Could you please try rephrasing your question?";

/// Default maximum message length in characters.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4000;

const LOG_PREVIEW_CHARS: usize = 50;

/// Result of handling one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub reply: String,
    /// Turns stored for the session before this message was handled.
    pub turn_count_before_reply: usize,
    pub used_external_data: bool,
    pub category: Option<Category>,
    pub prompt_type: Option<&'static str>,
    pub extracted_city: Option<String>,
    pub extracted_country: Option<String>,
    /// Best guess at the destination being discussed.
    pub destination: Option<String>,
    pub external_data: ExternalDataBag,
    /// Set when the apology was returned instead of a generated reply.
    pub error: bool,
}

impl ChatOutcome {
    fn apology(turn_count_before_reply: usize) -> Self {
        Self {
            reply: APOLOGY_MESSAGE.to_string(),
            turn_count_before_reply,
            used_external_data: false,
            category: None,
            prompt_type: None,
            extracted_city: None,
            extracted_country: None,
            destination: None,
            external_data: ExternalDataBag::default(),
            error: true,
        }
    }
}

/// Coordinates the classifier, executor, prompt library, LLM and store.
pub struct ChatOrchestrator {
    classifier: IntentClassifier,
    executor: FunctionExecutor,
    gateway: Arc<ExternalDataGateway>,
    prompts: Arc<PromptLibrary>,
    llm: Arc<dyn LlmClient>,
    store: ConversationStore,
    extractor: DestinationExtractor,
    params: GenerationParams,
    augment_attractions: bool,
    max_message_length: usize,
}

impl ChatOrchestrator {
    /// Build an orchestrator with the default LLM-then-keyword classifier.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        gateway: Arc<ExternalDataGateway>,
        store: ConversationStore,
        params: GenerationParams,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(llm.clone(), prompts.clone(), params),
            executor: FunctionExecutor::new(gateway.clone()),
            gateway,
            prompts,
            llm,
            store,
            extractor: DestinationExtractor::default(),
            params,
            augment_attractions: false,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }

    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Fetch attractions for destination and itinerary requests that name a city.
    pub fn with_attraction_augmentation(mut self, enabled: bool) -> Self {
        self.augment_attractions = enabled;
        self
    }

    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    pub fn max_message_length(&self) -> usize {
        self.max_message_length
    }

    /// Reject empty or over-long messages.
    pub fn validate(&self, message: &str) -> Result<(), ChatError> {
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }
        Ok(())
    }

    /// Handle one message for `session_id`.
    ///
    /// Never fails: any error returns the apology outcome with `error` set,
    /// and the session history is left as it was.
    pub async fn respond(
        &self,
        message: &str,
        session_id: &str,
        pre_supplied: Option<ExternalDataBag>,
    ) -> ChatOutcome {
        let history = self.store.get(session_id);
        let turn_count = history.len();

        tracing::info!(
            session_id,
            turns = turn_count,
            message = %truncate_for_log(message, LOG_PREVIEW_CHARS),
            "Handling chat message"
        );

        match self
            .run_pipeline(message, session_id, history, pre_supplied)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    session_id,
                    kind = e.kind().as_str(),
                    error = %e,
                    message = %truncate_for_log(message, LOG_PREVIEW_CHARS),
                    "Chat pipeline failed, returning apology"
                );
                ChatOutcome::apology(turn_count)
            }
        }
    }

    async fn run_pipeline(
        &self,
        message: &str,
        session_id: &str,
        history: Vec<ConversationTurn>,
        pre_supplied: Option<ExternalDataBag>,
    ) -> Result<ChatOutcome, ChatError> {
        self.validate(message)?;

        let analysis = self.classifier.analyze(message, &history).await;
        let fetched = self.executor.run(&analysis).await;

        let mut supplied = pre_supplied.unwrap_or_default();
        if self.augment_attractions
            && matches!(analysis.category, Category::Destination | Category::Itinerary)
        {
            if let Some(city) = analysis.city.as_deref() {
                if let Some(attractions) = self.gateway.get_attractions(city).await {
                    supplied.attractions = Some(attractions);
                }
            }
        }
        let external_data = supplied.merge(fetched);

        let kind = PromptKind::for_category(analysis.category);
        let prompt = self
            .prompts
            .build_response(kind, message, &history, &external_data)?;
        tracing::debug!(
            session_id,
            stage = "generate",
            prompt_type = kind.as_str(),
            prompt_chars = prompt.len(),
            data = ?external_data.keys(),
            "Prompt built"
        );

        let reply = self
            .llm
            .generate(&GenerationRequest::text(prompt, self.params))
            .await?
            .into_text()?;
        if reply.trim().is_empty() {
            return Err(LlmError::Malformed("empty reply text".to_string()).into());
        }

        self.store.append(
            session_id,
            ConversationTurn::user(message),
            ConversationTurn::assistant(reply.clone()),
        );

        let destination = analysis
            .city
            .clone()
            .or_else(|| self.extractor.extract(message).map(String::from))
            .or_else(|| analysis.country.clone());

        tracing::info!(
            session_id,
            category = %analysis.category,
            prompt_type = kind.as_str(),
            used_external_data = !external_data.is_empty(),
            "Reply generated"
        );

        Ok(ChatOutcome {
            reply,
            turn_count_before_reply: history.len(),
            used_external_data: !external_data.is_empty(),
            category: Some(analysis.category),
            prompt_type: Some(kind.as_str()),
            extracted_city: analysis.city,
            extracted_country: analysis.country,
            destination,
            external_data,
            error: false,
        })
    }

    /// Stored turns for `session_id`, oldest first.
    pub fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.store.get(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.store.active_sessions()
    }

    pub fn gateway(&self) -> &Arc<ExternalDataGateway> {
        &self.gateway
    }
}

/// At most `max` characters of `text`, with "..." appended when cut.
pub fn truncate_for_log(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FunctionCall, LlmReply};
    use crate::test_support::{text_reply, ScriptedLlm, StubData};
    use serde_json::json;
    use std::time::Duration;
    use wayfarer_core::types::{AttractionsData, WeatherData};

    fn prompts() -> Arc<PromptLibrary> {
        Arc::new(PromptLibrary::from_templates([
            ("system", "SYS"),
            ("classification", "CLASSIFY {{USER_MESSAGE}}"),
            ("destination", "DEST {{USER_MESSAGE}}\n{{CONVERSATION_HISTORY}}\n{{EXTERNAL_DATA_JSON}}"),
            ("planning", "PLAN {{USER_MESSAGE}}"),
            ("itinerary", "ITIN {{USER_MESSAGE}} {{EXTERNAL_DATA_JSON}}"),
            ("packing", "PACK {{USER_MESSAGE}} {{WEATHER_DATA_JSON}}"),
        ]))
    }

    fn analysis_call(args: serde_json::Value) -> LlmReply {
        LlmReply::FunctionCall(FunctionCall {
            name: "analyze_travel_request".to_string(),
            args,
        })
    }

    fn orchestrator(llm: Arc<ScriptedLlm>, data: &StubData, cap: usize) -> ChatOrchestrator {
        ChatOrchestrator::new(
            llm,
            prompts(),
            data.gateway.clone(),
            ConversationStore::new(cap, Duration::from_secs(3600)),
            GenerationParams::default(),
        )
    }

    /// LLM that can't classify (plain text) but generates a fixed reply.
    fn keyword_llm(reply: &str) -> Arc<ScriptedLlm> {
        Arc::new(ScriptedLlm::new(
            |_| Ok(LlmReply::Text("not a call".to_string())),
            text_reply(reply),
        ))
    }

    // ---- scenarios ----

    #[tokio::test]
    async fn test_destination_with_llm_entities() {
        let llm = Arc::new(ScriptedLlm::new(
            |_| {
                Ok(analysis_call(json!({
                    "category": "destination",
                    "city": "Paris",
                    "country": "France",
                    "function_to_call": "none"
                })))
            },
            text_reply("Paris is lovely in spring."),
        ));
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50);

        let out = orch
            .respond("I want to visit Paris, France", "session_1", None)
            .await;
        assert!(!out.error);
        assert_eq!(out.reply, "Paris is lovely in spring.");
        assert_eq!(out.category, Some(Category::Destination));
        assert_eq!(out.prompt_type, Some("destination"));
        assert_eq!(out.extracted_city.as_deref(), Some("Paris"));
        assert_eq!(out.extracted_country.as_deref(), Some("France"));
        assert_eq!(out.destination.as_deref(), Some("Paris"));
        assert_eq!(out.turn_count_before_reply, 0);
        assert!(!out.used_external_data);
    }

    #[tokio::test]
    async fn test_itinerary_selects_itinerary_prompt() {
        let llm = keyword_llm("Day 1: Shibuya...");
        let data = StubData::new(false);
        let orch = orchestrator(llm.clone(), &data, 50);

        let out = orch
            .respond("Create a 3-day itinerary for Tokyo", "s", None)
            .await;
        assert_eq!(out.category, Some(Category::Itinerary));
        assert_eq!(out.prompt_type, Some("itinerary"));

        let last = llm.requests().pop().unwrap();
        assert!(!last.wants_function_call());
        assert!(last.prompt.starts_with("ITIN Create a 3-day itinerary"));
    }

    #[tokio::test]
    async fn test_general_uses_destination_fallback() {
        let llm = keyword_llm("Hello, traveller!");
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50);

        let out = orch.respond("hello there", "s", None).await;
        assert_eq!(out.category, Some(Category::General));
        assert_eq!(out.prompt_type, Some("destination_fallback"));
    }

    #[tokio::test]
    async fn test_weather_failure_still_replies() {
        let llm = keyword_llm("Pack layers just in case.");
        let data = StubData::new(true);
        let orch = orchestrator(llm, &data, 50);

        let out = orch
            .respond("What's the weather in Tokyo?", "s", None)
            .await;
        assert!(!out.error);
        assert_eq!(out.reply, "Pack layers just in case.");
        assert!(out.external_data.weather.is_none());
        assert!(!out.used_external_data);
        assert_eq!(data.weather.calls(), 1);
    }

    #[tokio::test]
    async fn test_weather_success_is_used() {
        let llm = keyword_llm("It's mild.");
        let data = StubData::new(false);
        let orch = orchestrator(llm.clone(), &data, 50);

        let out = orch
            .respond("What's the weather in Tokyo?", "s", None)
            .await;
        assert!(out.used_external_data);
        assert_eq!(out.external_data.weather.unwrap().location, "Tokyo");
        assert!(llm.requests().last().unwrap().prompt.contains("clear sky"));
    }

    // ---- failures ----

    #[tokio::test]
    async fn test_generation_failure_returns_apology_and_keeps_context() {
        let llm = Arc::new(ScriptedLlm::new(
            |_| Ok(LlmReply::Text("x".to_string())),
            |_| Err(LlmError::MissingApiKey),
        ));
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50);

        let out = orch.respond("Where should I go?", "s", None).await;
        assert!(out.error);
        assert_eq!(out.reply, APOLOGY_MESSAGE);
        assert!(orch.history("s").is_empty());
    }

    #[tokio::test]
    async fn test_function_call_at_generation_is_failure() {
        let llm = Arc::new(ScriptedLlm::new(
            |_| Ok(LlmReply::Text("x".to_string())),
            |_| Ok(analysis_call(json!({"category": "general"}))),
        ));
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50);

        let out = orch.respond("hi", "s", None).await;
        assert!(out.error);
        assert_eq!(out.reply, APOLOGY_MESSAGE);
    }

    #[tokio::test]
    async fn test_empty_generated_text_is_failure() {
        let llm = keyword_llm("   ");
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50);
        assert!(orch.respond("hi", "s", None).await.error);
    }

    #[tokio::test]
    async fn test_missing_template_is_failure() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = ChatOrchestrator::new(
            llm,
            Arc::new(PromptLibrary::from_templates([("system", "SYS")])),
            data.gateway.clone(),
            ConversationStore::new(50, Duration::from_secs(3600)),
            GenerationParams::default(),
        );
        let out = orch.respond("plan my trip", "s", None).await;
        assert!(out.error);
    }

    #[tokio::test]
    async fn test_invalid_messages_take_apology_path() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = orchestrator(llm.clone(), &data, 50).with_max_message_length(10);

        assert!(orch.respond("", "s", None).await.error);
        assert!(orch.respond("this is far too long", "s", None).await.error);
        assert!(llm.requests().is_empty());
    }

    #[test]
    fn test_validate() {
        let data = StubData::new(false);
        let orch = orchestrator(keyword_llm("ok"), &data, 50).with_max_message_length(5);
        assert!(matches!(orch.validate(""), Err(ChatError::EmptyMessage)));
        assert!(matches!(orch.validate("123456"), Err(ChatError::MessageTooLong(5))));
        assert!(orch.validate("12345").is_ok());
        assert!(orch.validate("   ").is_ok());
        // Length is counted in characters, not bytes.
        assert!(orch.validate("ééééé").is_ok());
    }

    // ---- context ----

    #[tokio::test]
    async fn test_history_grows_and_feeds_prompt() {
        let llm = keyword_llm("Sure!");
        let data = StubData::new(false);
        let orch = orchestrator(llm.clone(), &data, 50);

        let first = orch.respond("hello", "s", None).await;
        let second = orch.respond("and again", "s", None).await;
        assert_eq!(first.turn_count_before_reply, 0);
        assert_eq!(second.turn_count_before_reply, 2);

        let last = llm.requests().pop().unwrap();
        assert!(last.prompt.contains("user: hello\nassistant: Sure!"));
        assert_eq!(orch.history("s").len(), 4);
    }

    #[tokio::test]
    async fn test_cap_is_enforced_through_respond() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 10);

        for i in 0..8 {
            orch.respond(&format!("message {i}"), "s", None).await;
        }
        let history = orch.history("s");
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].content, "message 3");
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_history() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50);

        orch.respond("one", "a", None).await;
        let out = orch.respond("two", "b", None).await;
        assert_eq!(out.turn_count_before_reply, 0);
        assert_eq!(orch.active_sessions(), 2);
    }

    // ---- external data merge ----

    #[tokio::test]
    async fn test_fresh_data_overrides_pre_supplied() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50);

        let stale = WeatherData {
            location: "Tokyo".to_string(),
            temperature: -40.0,
            description: "stale".to_string(),
            humidity: 0.0,
            wind_speed: 0.0,
            icon: "".to_string(),
        };
        let pre = ExternalDataBag {
            weather: Some(stale),
            attractions: Some(AttractionsData {
                destination: "Tokyo".to_string(),
                top_attractions: vec![],
                restaurants: vec![],
                hotels: vec![],
            }),
            ..Default::default()
        };

        let out = orch
            .respond("What's the weather in Tokyo?", "s", Some(pre))
            .await;
        assert_eq!(out.external_data.weather.unwrap().description, "clear sky");
        assert!(out.external_data.attractions.is_some());
    }

    #[tokio::test]
    async fn test_pre_supplied_data_alone_counts_as_used() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50);

        let pre = ExternalDataBag {
            attractions: Some(AttractionsData {
                destination: "Rome".to_string(),
                top_attractions: vec![],
                restaurants: vec![],
                hotels: vec![],
            }),
            ..Default::default()
        };
        let out = orch.respond("hello", "s", Some(pre)).await;
        assert!(out.used_external_data);
    }

    // ---- attractions augmentation ----

    #[tokio::test]
    async fn test_augmentation_adds_attractions_for_itinerary() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50).with_attraction_augmentation(true);

        let out = orch
            .respond("Create a 3-day itinerary for Tokyo", "s", None)
            .await;
        let attractions = out.external_data.attractions.unwrap();
        assert_eq!(attractions.destination, "Tokyo");
        assert_eq!(attractions.total(), 3);
    }

    #[tokio::test]
    async fn test_augmentation_off_by_default() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50);

        let out = orch
            .respond("Create a 3-day itinerary for Tokyo", "s", None)
            .await;
        assert!(out.external_data.attractions.is_none());
        assert_eq!(
            data.places
                .geocode_calls
                .load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn test_augmentation_skips_other_categories() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = orchestrator(llm, &data, 50).with_attraction_augmentation(true);

        let out = orch.respond("What should I pack for Tokyo?", "s", None).await;
        assert_eq!(out.category, Some(Category::Packing));
        assert!(out.external_data.attractions.is_none());
    }

    // ---- truncate_for_log ----

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 50), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("ééé", 2), "éé...");
        assert_eq!(truncate_for_log("", 5), "");
    }

    // ---- concurrency ----

    #[tokio::test]
    async fn test_concurrent_sessions() {
        let llm = keyword_llm("ok");
        let data = StubData::new(false);
        let orch = Arc::new(orchestrator(llm, &data, 50));

        let mut handles = Vec::new();
        for i in 0..10 {
            let orch = Arc::clone(&orch);
            handles.push(tokio::spawn(async move {
                orch.respond(&format!("concurrent {i}"), &format!("s{i}"), None)
                    .await
            }));
        }
        for handle in handles {
            assert!(!handle.await.unwrap().error);
        }
        assert_eq!(orch.active_sessions(), 10);
    }
}
