//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocols between the browser client and the
//! API server: one for taking a quiz, one for viewing a slide presentation.

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use classroom_core::lesson::Slide;
use classroom_core::presentation::NavState;
use classroom_core::quiz::{Answer, QuestionReview, StudentQuestion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;
use uuid::Uuid;

/// Anything the socket forwarder can turn into a frame.
pub trait IntoFrame {
    fn into_frame(self) -> Option<Message>;
}

fn json_frame<T: Serialize>(message: &T) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            None
        }
    }
}

//=========================================================================================
// Quiz Session (/ws/quiz)
//=========================================================================================

/// Messages the client sends while taking a quiz.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizClientMessage {
    /// Starts a new attempt. This or `Resume` must be the first message.
    Start { quiz_id: Uuid },

    /// Reattaches to an in-progress attempt, restoring any fresh local draft.
    Resume { attempt_id: Uuid },

    Answer { question_id: Uuid, answer: Answer },

    /// The browser lost its connection to the store. Answers are kept as
    /// drafts until `Online`.
    Offline,

    Online,

    Submit,

    /// Opens the review of the submitted attempt.
    Review,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizServerMessage {
    /// The attempt is in progress. `questions` are in presentation order with
    /// answer keys removed; `deadline` is absent for untimed quizzes.
    AttemptStarted {
        attempt_id: Uuid,
        questions: Vec<StudentQuestion>,
        deadline: Option<DateTime<Utc>>,
        answers: BTreeMap<Uuid, Answer>,
    },

    AnswerRecorded { question_id: Uuid },

    /// Answers recovered from a local draft on resume.
    DraftRestored { restored: usize },

    /// In-progress answers were written to the store.
    Saved { at: DateTime<Utc> },

    /// Answers are held locally until the connection comes back.
    SavePending,

    /// Back online; `flushed` says whether pending answers were written.
    ConnectionRestored { flushed: bool },

    Submitted {
        attempt_id: Uuid,
        score: u32,
        max_score: u32,
        percentage: f64,
        passed: bool,
        /// True when the time limit triggered the submit.
        auto: bool,
        /// Short answers graded by exact match because the AI grader failed.
        fallbacks: usize,
    },

    Review { questions: Vec<QuestionReview> },

    Error { message: String },
}

impl IntoFrame for QuizServerMessage {
    fn into_frame(self) -> Option<Message> {
        json_frame(&self)
    }
}

//=========================================================================================
// Presentation Viewer (/ws/presentation)
//=========================================================================================

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresentationClientMessage {
    /// Opens a slides component on its first slide.
    Open { component_id: Uuid },

    /// A `KeyboardEvent.key` value.
    Key { key: String },

    /// Horizontal touch travel in pixels (end x minus start x).
    Swipe { delta_x: f64 },

    /// Thumbnail jump.
    GoTo { index: usize },

    Translate { target_language: String },

    /// Read the current slide aloud. The audio follows as a binary frame.
    Speak,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresentationServerMessage {
    Opened {
        component_id: Uuid,
        title: String,
        state: NavState,
        slide: Option<Slide>,
        read_aloud: bool,
        language_code: Option<String>,
    },

    Navigated { state: NavState, slide: Option<Slide> },

    /// Every slide has been viewed. Sent once per presentation.
    Completed { component_id: Uuid },

    Translation {
        index: usize,
        target_language: String,
        text: String,
    },

    /// Audio for slide `index` follows as a binary frame.
    SpeechStarted { index: usize },

    Error { message: String },
}

/// What the presentation runtime queues for the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationOutput {
    Message(PresentationServerMessage),
    Audio(Vec<u8>),
}

impl IntoFrame for PresentationOutput {
    fn into_frame(self) -> Option<Message> {
        match self {
            PresentationOutput::Message(message) => json_frame(&message),
            PresentationOutput::Audio(audio) => Some(Message::Binary(audio.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_messages_accept_text_and_lists() {
        let text: QuizClientMessage = serde_json::from_str(
            r#"{"type":"answer","question_id":"6f1c2a3e-7d89-4b1c-9f5e-2a3b4c5d6e7f","answer":"Mitochondria"}"#,
        )
        .unwrap();
        assert!(matches!(
            text,
            QuizClientMessage::Answer { answer: Answer::Text(ref t), .. } if t == "Mitochondria"
        ));

        let list: QuizClientMessage = serde_json::from_str(
            r#"{"type":"answer","question_id":"6f1c2a3e-7d89-4b1c-9f5e-2a3b4c5d6e7f","answer":["a","b"]}"#,
        )
        .unwrap();
        assert!(matches!(list, QuizClientMessage::Answer { answer: Answer::List(ref l), .. } if l.len() == 2));
    }

    #[test]
    fn server_messages_are_tagged_by_type() {
        let json = serde_json::to_value(QuizServerMessage::ConnectionRestored { flushed: true }).unwrap();
        assert_eq!(json["type"], "connection_restored");
        assert_eq!(json["flushed"], true);
    }

    #[test]
    fn audio_output_becomes_a_binary_frame() {
        let frame = PresentationOutput::Audio(vec![1, 2, 3]).into_frame();
        assert!(matches!(frame, Some(Message::Binary(ref data)) if data.len() == 3));
    }
}
