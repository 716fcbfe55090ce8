//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the role checks handlers run
//! against the signed-in user.

use crate::config::Config;
use crate::error::{port_failure, HandlerError};
use axum::http::StatusCode;
use classroom_core::domain::{Role, User};
use classroom_core::ports::{
    ClassRepository, ContentRepository, DiscussionPromptService, DraftStore, FileStorage,
    LessonRepository, QuizRepository, ShortAnswerGrader, TextToSpeechService,
    TranslationService, UserRepository,
};
use std::sync::Arc;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserRepository>,
    pub content: Arc<dyn ContentRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub classes: Arc<dyn ClassRepository>,
    pub drafts: Arc<dyn DraftStore>,
    pub storage: Arc<dyn FileStorage>,
    pub grader: Arc<dyn ShortAnswerGrader>,
    pub discussion: Arc<dyn DiscussionPromptService>,
    pub translator: Arc<dyn TranslationService>,
    pub tts: Arc<dyn TextToSpeechService>,
}

//=========================================================================================
// Access Checks
//=========================================================================================

impl AppState {
    /// Loads the signed-in user.
    pub async fn current_user(&self, user_id: Uuid) -> Result<User, HandlerError> {
        let user = self
            .users
            .get_user(user_id)
            .await
            .map_err(|e| port_failure("Failed to load user", e))?;
        if !user.is_active() {
            return Err((StatusCode::FORBIDDEN, "This account is inactive".to_string()));
        }
        Ok(user)
    }

    /// Teachers, admins and developers.
    pub async fn staff_user(&self, user_id: Uuid) -> Result<User, HandlerError> {
        let user = self.current_user(user_id).await?;
        if !user.role().is_staff() {
            return Err((StatusCode::FORBIDDEN, "Staff access required".to_string()));
        }
        Ok(user)
    }

    /// Admins and developers.
    pub async fn admin_user(&self, user_id: Uuid) -> Result<User, HandlerError> {
        let user = self.current_user(user_id).await?;
        if !matches!(user.role(), Role::Admin | Role::Developer) {
            return Err((StatusCode::FORBIDDEN, "Administrator access required".to_string()));
        }
        Ok(user)
    }
}
