//! Language-model client for the OpenAI-compatible completion endpoint.

mod client;
mod types;

pub use client::{CompletionModel, ModelClient};
pub use types::{Choice, ChoiceMessage, CompletionRequest, CompletionResponse, Message, MessageRole, Usage};
