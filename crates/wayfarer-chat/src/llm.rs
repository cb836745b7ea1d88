//! Text-generation client seam and the Gemini `generateContent` implementation.
//!
//! A reply is either free text or a structured function call; [`LlmReply`]
//! makes callers handle both.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wayfarer_core::config::LlmConfig;

use crate::error::LlmError;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

impl From<&LlmConfig> for GenerationParams {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

/// A callable function offered to the model in structured-decision mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON-schema-like parameter spec.
    pub parameters: serde_json::Value,
}

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub params: GenerationParams,
    /// Empty for plain-text generation.
    pub functions: Vec<FunctionDeclaration>,
}

impl GenerationRequest {
    /// Plain-text generation.
    pub fn text(prompt: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            prompt: prompt.into(),
            params,
            functions: Vec::new(),
        }
    }

    /// Structured-decision generation offering `functions`.
    pub fn with_functions(
        prompt: impl Into<String>,
        params: GenerationParams,
        functions: Vec<FunctionDeclaration>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            params,
            functions,
        }
    }

    pub fn wants_function_call(&self) -> bool {
        !self.functions.is_empty()
    }
}

/// A structured call returned by the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// What the model answered with.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmReply {
    Text(String),
    FunctionCall(FunctionCall),
}

impl LlmReply {
    /// The reply text, or `UnexpectedFunctionCall` if the model made a call.
    pub fn into_text(self) -> Result<String, LlmError> {
        match self {
            LlmReply::Text(text) => Ok(text),
            LlmReply::FunctionCall(call) => Err(LlmError::UnexpectedFunctionCall(call.name)),
        }
    }
}

/// A text-generation backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmReply, LlmError>;
}

// =============================================================================
// Gemini
// =============================================================================

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.api_url.replace("{model}", &config.model),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmReply, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let body = GenerateContentRequest::from(request);
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let reply = shape_reply(&text)?;
        match &reply {
            LlmReply::FunctionCall(call) => {
                tracing::debug!(function = %call.name, "Gemini returned a function call")
            }
            LlmReply::Text(t) => tracing::debug!(chars = t.len(), "Gemini returned text"),
        }
        Ok(reply)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationParams,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

impl<'a> From<&'a GenerationRequest> for GenerateContentRequest<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        let tools = if request.wants_function_call() {
            vec![Tool {
                function_declarations: &request.functions,
            }]
        } else {
            Vec::new()
        };
        Self {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: request.params,
            tools,
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartResponse {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

/// Interpret the first part of the first candidate.
fn shape_reply(body: &str) -> Result<LlmReply, LlmError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Malformed(e.to_string()))?;

    let part = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Malformed("no candidates in response".to_string()))?
        .content
        .and_then(|c| c.parts.into_iter().next())
        .ok_or_else(|| LlmError::Malformed("no content parts in response".to_string()))?;

    if let Some(call) = part.function_call {
        return Ok(LlmReply::FunctionCall(call));
    }
    match part.text {
        Some(text) if !text.is_empty() => Ok(LlmReply::Text(text)),
        _ => Err(LlmError::Malformed("empty content part".to_string())),
    }
}
