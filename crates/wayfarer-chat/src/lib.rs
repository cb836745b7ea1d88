//! Conversational pipeline for Wayfarer.
//!
//! A message is classified (LLM function call, then keyword fallback), the
//! chosen weather or country lookup is executed, a response prompt is
//! rendered from templates, and the final reply is generated and stored in
//! the session's conversation context.

pub mod classifier;
pub mod context;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod llm;
pub mod orchestrator;
pub mod prompts;

#[cfg(test)]
mod test_support;

pub use classifier::{
    ClassificationStrategy, IntentClassifier, KeywordStrategy, LlmStrategy, ANALYZE_FUNCTION,
};
pub use context::ConversationStore;
pub use error::{ChatError, ErrorKind, LlmError};
pub use executor::FunctionExecutor;
pub use extractor::DestinationExtractor;
pub use llm::{
    FunctionCall, FunctionDeclaration, GeminiClient, GenerationParams, GenerationRequest,
    LlmClient, LlmReply,
};
pub use orchestrator::{ChatOrchestrator, ChatOutcome, APOLOGY_MESSAGE};
pub use prompts::{PromptKind, PromptLibrary};
