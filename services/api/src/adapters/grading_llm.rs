//! services/api/src/adapters/grading_llm.rs
//!
//! This module contains the adapter for AI short-answer grading.
//! It implements the `ShortAnswerGrader` port from the `core` crate.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use classroom_core::ports::{PortError, PortResult, ShortAnswerGrader};

use crate::adapters::chat::complete;

const SYSTEM_INSTRUCTIONS: &str = "You grade short answers written by K-12 students. \
You receive a question, one or more accepted answers, and the student's answer. \
Accept answers that mean the same thing as an accepted answer, even with minor spelling \
mistakes or different wording. Reject answers that are incomplete, vague or wrong. \
Respond with EXACTLY one word: CORRECT or INCORRECT.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct OpenAiGradingAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGradingAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Reads the model's one-word verdict. Anything else is an error, which makes
/// the caller fall back to exact matching.
pub fn parse_verdict(reply: &str) -> PortResult<bool> {
    let word = reply
        .trim()
        .trim_matches(|c: char| !c.is_ascii_alphabetic())
        .to_ascii_uppercase();
    match word.as_str() {
        "CORRECT" => Ok(true),
        "INCORRECT" => Ok(false),
        _ => Err(PortError::Unexpected(format!(
            "Grading LLM returned an unrecognised verdict: '{}'",
            reply
        ))),
    }
}

//=========================================================================================
// `ShortAnswerGrader` Trait Implementation
//=========================================================================================

#[async_trait]
impl ShortAnswerGrader for OpenAiGradingAdapter {
    async fn grade_short_answer(
        &self,
        prompt: &str,
        expected_answers: &[String],
        answer: &str,
    ) -> PortResult<bool> {
        let user = format!(
            "QUESTION: {}\n\nACCEPTED ANSWERS:\n- {}\n\nSTUDENT ANSWER: {}",
            prompt,
            expected_answers.join("\n- "),
            answer
        );
        let reply = complete(&self.client, &self.model, SYSTEM_INSTRUCTIONS, user).await?;
        parse_verdict(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_are_parsed_strictly() {
        assert!(parse_verdict("CORRECT").unwrap());
        assert!(parse_verdict(" correct.\n").unwrap());
        assert!(!parse_verdict("INCORRECT").unwrap());
        assert!(parse_verdict("Partially correct").is_err());
    }
}
