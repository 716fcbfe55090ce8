//! crates/classroom_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, so the core
//! stays independent of the database, the object storage and the AI functions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::{
    Class, ClassAssignment, ContentItem, ContentVersion, Lesson, LessonComponent, Quiz,
    QuizAttempt, QuizQuestion, Role, RoleProfile, User, UserCredentials, UserStatus,
};
use crate::drafts::AnswerDraft;
use crate::quiz::Answer;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

/// Fields needed to insert a user row.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: String,
    pub hashed_password: String,
    pub first_name: String,
    pub last_name: String,
    pub profile: RoleProfile,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: NewUserRecord) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn list_users(&self, role: Option<Role>) -> PortResult<Vec<User>>;

    async fn update_user_status(&self, user_id: Uuid, status: UserStatus) -> PortResult<()>;

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn create_content(&self, item: ContentItem) -> PortResult<ContentItem>;

    async fn get_content(&self, content_id: Uuid) -> PortResult<ContentItem>;

    async fn list_content(&self) -> PortResult<Vec<ContentItem>>;

    /// Writes the edited item and its new version record together.
    async fn save_revision(&self, item: &ContentItem, version: &ContentVersion) -> PortResult<()>;

    async fn set_published(&self, content_id: Uuid, is_published: bool) -> PortResult<()>;

    async fn delete_content(&self, content_id: Uuid) -> PortResult<()>;

    /// Newest first.
    async fn list_versions(&self, content_id: Uuid) -> PortResult<Vec<ContentVersion>>;
}

#[async_trait]
pub trait LessonRepository: Send + Sync {
    async fn create_lesson(&self, lesson: Lesson) -> PortResult<Lesson>;

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<Lesson>;

    async fn list_lessons(&self) -> PortResult<Vec<Lesson>>;

    /// Components of a lesson sorted by `order`.
    async fn list_components(&self, lesson_id: Uuid) -> PortResult<Vec<LessonComponent>>;

    async fn get_component(&self, component_id: Uuid) -> PortResult<LessonComponent>;

    /// Inserts or replaces a component.
    async fn save_component(&self, component: &LessonComponent) -> PortResult<()>;

    async fn delete_component(&self, component_id: Uuid) -> PortResult<()>;

    async fn update_component_orders(&self, orders: &[(Uuid, i32)]) -> PortResult<()>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn create_quiz(&self, quiz: Quiz) -> PortResult<Quiz>;

    async fn get_quiz(&self, quiz_id: Uuid) -> PortResult<Quiz>;

    async fn add_question(&self, question: QuizQuestion) -> PortResult<QuizQuestion>;

    /// Questions with their options, sorted by position.
    async fn list_questions(&self, quiz_id: Uuid) -> PortResult<Vec<QuizQuestion>>;

    async fn count_attempts(&self, quiz_id: Uuid, student_id: Uuid) -> PortResult<u32>;

    async fn create_attempt(&self, attempt: &QuizAttempt) -> PortResult<()>;

    async fn get_attempt(&self, attempt_id: Uuid) -> PortResult<QuizAttempt>;

    /// Autosave of in-progress answers.
    async fn save_attempt_answers(
        &self,
        attempt_id: Uuid,
        answers: &BTreeMap<Uuid, Answer>,
        updated_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Writes the final, graded attempt.
    async fn finalize_attempt(&self, attempt: &QuizAttempt) -> PortResult<()>;

    async fn list_attempts_for_quizzes(&self, quiz_ids: &[Uuid]) -> PortResult<Vec<QuizAttempt>>;
}

#[async_trait]
pub trait ClassRepository: Send + Sync {
    async fn create_class(&self, class: Class) -> PortResult<Class>;

    async fn get_class(&self, class_id: Uuid) -> PortResult<Class>;

    async fn list_classes_for_teacher(&self, teacher_id: Uuid) -> PortResult<Vec<Class>>;

    async fn create_assignment(&self, assignment: ClassAssignment) -> PortResult<ClassAssignment>;

    async fn list_assignments(&self, class_id: Uuid) -> PortResult<Vec<ClassAssignment>>;
}

/// Local persistence of in-progress quiz answers.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save_draft(&self, draft: AnswerDraft) -> PortResult<()>;

    async fn load_draft(&self, attempt_id: Uuid) -> PortResult<Option<AnswerDraft>>;

    async fn clear_draft(&self, attempt_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores the bytes in `bucket` and returns a public URL.
    async fn upload(
        &self,
        bucket: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> PortResult<String>;
}

//=========================================================================================
// Function Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ShortAnswerGrader: Send + Sync {
    /// Judges whether `answer` is an acceptable response to `prompt`.
    async fn grade_short_answer(
        &self,
        prompt: &str,
        expected_answers: &[String],
        answer: &str,
    ) -> PortResult<bool>;
}

#[async_trait]
pub trait DiscussionPromptService: Send + Sync {
    async fn generate_discussion_prompt(
        &self,
        topic: &str,
        grade_level: Option<&str>,
    ) -> PortResult<String>;
}

#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> PortResult<String>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}
