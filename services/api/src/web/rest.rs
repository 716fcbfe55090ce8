//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, plus the profile
//! endpoint for the signed-in user.

use crate::web::state::AppState;
use crate::web::{auth, classes, content, functions, lessons, quizzes, users};
use crate::error::HandlerError;
use axum::{
    extract::State,
    response::{IntoResponse, Json},
    Extension,
};
use std::sync::Arc;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        me_handler,
        users::list_users_handler,
        users::create_user_handler,
        users::update_status_handler,
        users::reset_password_handler,
        content::list_content_handler,
        content::create_content_handler,
        content::get_content_handler,
        content::update_content_handler,
        content::delete_content_handler,
        content::toggle_publish_handler,
        content::list_versions_handler,
        lessons::list_lessons_handler,
        lessons::create_lesson_handler,
        lessons::get_lesson_handler,
        lessons::list_components_handler,
        lessons::create_component_handler,
        lessons::reorder_components_handler,
        lessons::get_component_handler,
        lessons::update_component_handler,
        lessons::delete_component_handler,
        lessons::edit_field_handler,
        lessons::edit_json_handler,
        lessons::view_component_handler,
        lessons::editor_handler,
        quizzes::create_quiz_handler,
        quizzes::get_quiz_handler,
        quizzes::add_question_handler,
        quizzes::list_attempts_handler,
        quizzes::review_attempt_handler,
        classes::list_classes_handler,
        classes::create_class_handler,
        classes::list_assignments_handler,
        classes::create_assignment_handler,
        classes::gradebook_handler,
        classes::dashboard_handler,
        functions::upload_file_handler,
        functions::extract_slide_text_handler,
        functions::discussion_prompt_handler,
        functions::grade_short_answer_handler,
        functions::translate_handler,
        functions::speak_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            users::StatusRequest,
            users::PasswordResetRequest,
            content::PublishResponse,
            lessons::CreateLessonRequest,
            lessons::CreateComponentRequest,
            lessons::UpdateComponentRequest,
            lessons::FieldEditRequest,
            lessons::JsonEditRequest,
            lessons::ReorderRequest,
            quizzes::CreateQuizRequest,
            quizzes::OptionInput,
            quizzes::CreateQuestionRequest,
            classes::CreateClassRequest,
            classes::CreateAssignmentRequest,
            functions::UploadResponse,
            functions::DiscussionPromptRequest,
            functions::DiscussionPromptResponse,
            functions::GradeShortAnswerRequest,
            functions::GradeShortAnswerResponse,
            functions::TranslateRequest,
            functions::TranslateResponse,
            functions::SpeakRequest,
        )
    ),
    tags(
        (name = "STEM Classroom API", description = "Lessons, quizzes, content library, classes and user administration.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Profile
//=========================================================================================

/// GET /me - The signed-in user with their role profile
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "The current user"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Account inactive")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.current_user(user_id).await?;
    Ok(Json(user))
}
