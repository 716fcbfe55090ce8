//! services/api/src/adapters/discussion_llm.rs
//!
//! This module contains the adapter that writes discussion prompts for lesson
//! discussion components. It implements the `DiscussionPromptService` port.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use classroom_core::ports::{DiscussionPromptService, PortResult};

use crate::adapters::chat::complete;

const SYSTEM_INSTRUCTIONS: &str = "You are a STEM teacher writing a discussion prompt for a class. \
Write ONE open-ended question that invites students to explain their reasoning, connect the topic \
to everyday life, and respond to classmates. Match the vocabulary to the grade level when one is \
given. Respond with the prompt only, no preamble and no quotation marks.";

#[derive(Clone)]
pub struct OpenAiDiscussionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiDiscussionAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl DiscussionPromptService for OpenAiDiscussionAdapter {
    async fn generate_discussion_prompt(
        &self,
        topic: &str,
        grade_level: Option<&str>,
    ) -> PortResult<String> {
        let user = match grade_level {
            Some(grade) => format!("TOPIC: {}\nGRADE LEVEL: {}", topic, grade),
            None => format!("TOPIC: {}", topic),
        };
        let prompt = complete(&self.client, &self.model, SYSTEM_INSTRUCTIONS, user).await?;
        Ok(prompt.trim_matches('"').to_string())
    }
}
