//! services/api/src/adapters/chat.rs
//!
//! The single chat-completion round trip shared by the AI function adapters.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client, error::OpenAIError,
};
use classroom_core::ports::{PortError, PortResult};

/// Sends one system + user exchange and returns the text of the first choice.
pub async fn complete(
    client: &Client<OpenAIConfig>,
    model: &str,
    system: &str,
    user: String,
) -> PortResult<String> {
    let messages = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(user)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    ];

    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(messages)
        .n(1)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

    let response = client
        .chat()
        .create(request)
        .await
        .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| PortError::Unexpected("LLM response contained no text content.".to_string()))
}
