//! services/api/src/web/quizzes.rs
//!
//! Quiz authoring and attempt review. Taking a quiz happens over the quiz
//! websocket; these endpoints cover everything around it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use classroom_core::domain::{AttemptStatus, QuestionType, Quiz, QuizAttempt, QuizOption, QuizQuestion, User};
use classroom_core::quiz::{self, QuizSession, StudentQuestion};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{port_failure, quiz_failure, HandlerError};
use crate::web::state::AppState;

const DEFAULT_PASS_THRESHOLD: f64 = 70.0;

#[derive(Deserialize, ToSchema)]
pub struct CreateQuizRequest {
    pub title: String,
    #[serde(default)]
    pub lesson_component_id: Option<Uuid>,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub attempts_allowed: Option<u32>,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
    /// Percentage needed to pass; 70 when omitted.
    #[serde(default)]
    pub pass_threshold: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct OptionInput {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateQuestionRequest {
    /// multiple_choice, true_false, multiple_select, short_answer or fill_blank.
    pub question_type: String,
    pub prompt: String,
    #[serde(default = "default_points")]
    pub points: u32,
    /// Choices for choice questions, accepted answers for short answer and
    /// one entry per blank for fill-in-the-blank.
    #[serde(default)]
    pub options: Vec<OptionInput>,
}

fn default_points() -> u32 {
    1
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum QuestionList {
    Full(Vec<QuizQuestion>),
    Student(Vec<StudentQuestion>),
}

#[derive(Serialize)]
pub struct QuizDetail {
    pub quiz: Quiz,
    pub questions: QuestionList,
}

//=========================================================================================
// Authoring
//=========================================================================================

/// POST /quizzes - Create a quiz
#[utoipa::path(
    post,
    path = "/quizzes",
    request_body = CreateQuizRequest,
    responses(
        (status = 201, description = "Quiz created"),
        (status = 400, description = "Invalid settings"),
        (status = 403, description = "Staff access required")
    )
)]
pub async fn create_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let quiz = Quiz {
        id: Uuid::new_v4(),
        lesson_component_id: req.lesson_component_id,
        title: req.title.trim().to_string(),
        time_limit_minutes: req.time_limit_minutes,
        attempts_allowed: req.attempts_allowed,
        shuffle_questions: req.shuffle_questions,
        shuffle_options: req.shuffle_options,
        pass_threshold: req.pass_threshold.unwrap_or(DEFAULT_PASS_THRESHOLD),
        created_by: user.id,
        created_at: Utc::now(),
    };
    quiz::validate_quiz(&quiz).map_err(quiz_failure)?;

    let quiz = state
        .quizzes
        .create_quiz(quiz)
        .await
        .map_err(|e| port_failure("Failed to create quiz", e))?;
    info!("Quiz {} created by {}", quiz.id, user.id);
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// GET /quizzes/{id} - A quiz with its questions
///
/// Staff get the answer key; students get questions with correct flags and
/// accepted answers removed.
#[utoipa::path(
    get,
    path = "/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses((status = 200, description = "Quiz and questions"), (status = 404, description = "Not found"))
)]
pub async fn get_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.current_user(user_id).await?;
    let quiz = state
        .quizzes
        .get_quiz(quiz_id)
        .await
        .map_err(|e| port_failure("Failed to load quiz", e))?;
    let questions = state
        .quizzes
        .list_questions(quiz_id)
        .await
        .map_err(|e| port_failure("Failed to load questions", e))?;

    let questions = if user.role().is_staff() {
        QuestionList::Full(questions)
    } else {
        QuestionList::Student(questions.iter().map(StudentQuestion::from).collect())
    };
    Ok(Json(QuizDetail { quiz, questions }))
}

/// POST /quizzes/{id}/questions - Append a question
#[utoipa::path(
    post,
    path = "/quizzes/{id}/questions",
    request_body = CreateQuestionRequest,
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = 201, description = "Question added"),
        (status = 400, description = "Unknown type or invalid options"),
        (status = 404, description = "Quiz not found")
    )
)]
pub async fn add_question_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(quiz_id): Path<Uuid>,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    state.staff_user(user_id).await?;
    let question_type = QuestionType::parse(req.question_type.trim()).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown question type '{}'", req.question_type),
        )
    })?;

    let existing = state
        .quizzes
        .list_questions(quiz_id)
        .await
        .map_err(|e| port_failure("Failed to load questions", e))?;
    state
        .quizzes
        .get_quiz(quiz_id)
        .await
        .map_err(|e| port_failure("Failed to load quiz", e))?;

    let question = QuizQuestion {
        id: Uuid::new_v4(),
        quiz_id,
        question_type,
        prompt: req.prompt.trim().to_string(),
        points: req.points,
        position: existing.iter().map(|q| q.position + 1).max().unwrap_or(0),
        options: req
            .options
            .into_iter()
            .enumerate()
            .map(|(position, option)| QuizOption {
                id: Uuid::new_v4(),
                text: option.text.trim().to_string(),
                // Short-answer and blank entries are the accepted answers.
                is_correct: option.is_correct
                    || matches!(question_type, QuestionType::ShortAnswer | QuestionType::FillBlank),
                position: position as i32,
            })
            .collect(),
    };
    quiz::validate_question(&question).map_err(quiz_failure)?;

    let question = state
        .quizzes
        .add_question(question)
        .await
        .map_err(|e| port_failure("Failed to add question", e))?;
    Ok((StatusCode::CREATED, Json(question)))
}

//=========================================================================================
// Attempts
//=========================================================================================

/// Staff see every attempt; anyone else only their own.
fn visible_attempts(user: &User, mut attempts: Vec<QuizAttempt>) -> Vec<QuizAttempt> {
    if !user.role().is_staff() {
        attempts.retain(|a| a.student_id == user.id);
    }
    attempts
}

/// GET /quizzes/{id}/attempts - The caller's attempts, or everyone's for staff
#[utoipa::path(
    get,
    path = "/quizzes/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses((status = 200, description = "Attempts"))
)]
pub async fn list_attempts_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.current_user(user_id).await?;
    let attempts = state
        .quizzes
        .list_attempts_for_quizzes(&[quiz_id])
        .await
        .map_err(|e| port_failure("Failed to list attempts", e))?;
    Ok(Json(visible_attempts(&user, attempts)))
}

/// GET /attempts/{id}/review - Per-question review of a submitted attempt
///
/// The first review moves the attempt from completed to reviewing.
#[utoipa::path(
    get,
    path = "/attempts/{id}/review",
    params(("id" = Uuid, Path, description = "Attempt id")),
    responses(
        (status = 200, description = "Questions with answers, correct answers and points"),
        (status = 400, description = "Attempt not submitted yet"),
        (status = 403, description = "Not your attempt"),
        (status = 404, description = "Not found")
    )
)]
pub async fn review_attempt_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.current_user(user_id).await?;
    let attempt = state
        .quizzes
        .get_attempt(attempt_id)
        .await
        .map_err(|e| port_failure("Failed to load attempt", e))?;
    if attempt.student_id != user.id && !user.role().is_staff() {
        return Err((StatusCode::FORBIDDEN, "You cannot review this attempt".to_string()));
    }

    let quiz = state
        .quizzes
        .get_quiz(attempt.quiz_id)
        .await
        .map_err(|e| port_failure("Failed to load quiz", e))?;
    let questions = state
        .quizzes
        .list_questions(attempt.quiz_id)
        .await
        .map_err(|e| port_failure("Failed to load questions", e))?;

    let first_review = attempt.status == AttemptStatus::Completed;
    let mut session = QuizSession::resume(quiz, questions, attempt);
    session.begin_review().map_err(quiz_failure)?;
    let Some(attempt) = session.attempt() else {
        return Err(quiz_failure(quiz::QuizError::NotCompleted));
    };
    // Only the owner's first look changes the stored state.
    if first_review && attempt.student_id == user.id {
        state
            .quizzes
            .finalize_attempt(attempt)
            .await
            .map_err(|e| port_failure("Failed to update attempt", e))?;
        info!("Attempt {} moved to review", attempt.id);
    }
    Ok(Json(quiz::review(session.questions(), attempt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use classroom_core::domain::{RoleProfile, UserStatus};
    use std::collections::BTreeMap;

    fn user(profile: RoleProfile) -> User {
        User {
            id: Uuid::new_v4(),
            email: "someone@school.example".into(),
            first_name: "Sam".into(),
            last_name: "Rivera".into(),
            status: UserStatus::Active,
            profile,
            created_at: Utc::now(),
        }
    }

    fn attempt(student_id: Uuid) -> QuizAttempt {
        QuizAttempt {
            id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            student_id,
            status: AttemptStatus::Completed,
            answers: BTreeMap::new(),
            question_order: Vec::new(),
            results: Vec::new(),
            score: 0,
            max_score: 0,
            percentage: 0.0,
            passed: false,
            started_at: Utc::now(),
            submitted_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn students_only_see_their_own_attempts() {
        let student = user(RoleProfile::Student {
            grade_level: None,
            class_ids: Vec::new(),
        });
        let attempts = vec![attempt(student.id), attempt(Uuid::new_v4()), attempt(student.id)];

        let visible = visible_attempts(&student, attempts);
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|a| a.student_id == student.id));
    }

    #[test]
    fn teachers_see_every_attempt() {
        let teacher = user(RoleProfile::Teacher {
            district: None,
            subject_areas: Vec::new(),
        });
        let attempts = vec![attempt(Uuid::new_v4()), attempt(Uuid::new_v4())];
        assert_eq!(visible_attempts(&teacher, attempts).len(), 2);
    }
}
