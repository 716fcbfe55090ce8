//! services/api/src/adapters/translate_llm.rs
//!
//! This module contains the adapter for on-demand translation of lesson text.
//! It implements the `TranslationService` port from the `core` crate.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use classroom_core::ports::{PortError, PortResult, TranslationService};

use crate::adapters::chat::complete;

const SYSTEM_INSTRUCTIONS: &str = "You translate classroom material for students. \
Translate the user's text into the requested language, keeping scientific terms accurate and \
the reading level the same. Respond with the translation only.";

#[derive(Clone)]
pub struct OpenAiTranslationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTranslationAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl TranslationService for OpenAiTranslationAdapter {
    async fn translate(&self, text: &str, target_language: &str) -> PortResult<String> {
        if target_language.trim().is_empty() {
            return Err(PortError::Unexpected("A target language is required".to_string()));
        }
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let user = format!("TARGET LANGUAGE: {}\n\nTEXT:\n{}", target_language.trim(), text);
        complete(&self.client, &self.model, SYSTEM_INSTRUCTIONS, user).await
    }
}
