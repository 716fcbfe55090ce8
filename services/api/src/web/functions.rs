//! services/api/src/web/functions.rs
//!
//! File upload and the function endpoints: slide text extraction, discussion
//! prompt generation, short-answer grading, translation and speech.

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use bytes::Bytes;
use classroom_core::lesson::Slide;
use classroom_core::presentation::split_slide_export;
use classroom_core::quiz::exact_match;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::storage::LESSON_FILES_BUCKET;
use crate::error::{port_failure, HandlerError};
use crate::web::state::AppState;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Serialize)]
pub struct SlideTextResponse {
    pub slides: Vec<Slide>,
}

#[derive(Deserialize, ToSchema)]
pub struct DiscussionPromptRequest {
    pub topic: String,
    #[serde(default)]
    pub grade_level: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DiscussionPromptResponse {
    pub prompt: String,
}

#[derive(Deserialize, ToSchema)]
pub struct GradeShortAnswerRequest {
    pub prompt: String,
    pub expected_answers: Vec<String>,
    pub answer: String,
}

#[derive(Serialize, ToSchema)]
pub struct GradeShortAnswerResponse {
    pub is_correct: bool,
    /// True when the AI grader failed and exact matching decided.
    pub fallback: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct TranslateRequest {
    pub text: String,
    pub target_language: String,
}

#[derive(Serialize, ToSchema)]
pub struct TranslateResponse {
    pub translated_text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SpeakRequest {
    pub text: String,
}

//=========================================================================================
// Multipart
//=========================================================================================

struct UploadedFile {
    file_name: String,
    content_type: String,
    data: Bytes,
}

/// Reads the first file part of a multipart form.
async fn read_file_part(multipart: &mut Multipart) -> Result<UploadedFile, HandlerError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read multipart data: {}", e)))?
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Multipart form must include a file".to_string()))?;

    let file_name = field.file_name().unwrap_or("upload.bin").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read file bytes: {}", e)))?;
    if data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "The uploaded file is empty".to_string()));
    }
    Ok(UploadedFile {
        file_name,
        content_type,
        data,
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /files - Upload a lesson file and get its public URL
#[utoipa::path(
    post,
    path = "/files",
    request_body(content_type = "multipart/form-data", description = "The file to store."),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 400, description = "Missing or empty file")
    )
)]
pub async fn upload_file_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let file = read_file_part(&mut multipart).await?;
    let url = state
        .storage
        .upload(LESSON_FILES_BUCKET, &file.file_name, &file.content_type, &file.data)
        .await
        .map_err(|e| port_failure("Failed to store file", e))?;
    info!("{} uploaded {} ({} bytes)", user.id, file.file_name, file.data.len());
    Ok((StatusCode::CREATED, Json(UploadResponse { url })))
}

/// POST /functions/extract-slide-text - Split an uploaded text export into slides
#[utoipa::path(
    post,
    path = "/functions/extract-slide-text",
    request_body(content_type = "multipart/form-data", description = "A UTF-8 slide export."),
    responses(
        (status = 200, description = "Slides with title and body"),
        (status = 400, description = "Missing file or not UTF-8 text")
    )
)]
pub async fn extract_slide_text_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    state.staff_user(user_id).await?;
    let file = read_file_part(&mut multipart).await?;
    let text = String::from_utf8(file.data.to_vec()).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Uploaded file is not valid UTF-8 text: {}", e),
        )
    })?;
    let slides = split_slide_export(&text);
    if slides.is_empty() {
        warn!("No slides found in {}", file.file_name);
    }
    Ok(Json(SlideTextResponse { slides }))
}

/// POST /functions/generate-discussion-prompt - AI-written discussion prompt
#[utoipa::path(
    post,
    path = "/functions/generate-discussion-prompt",
    request_body = DiscussionPromptRequest,
    responses(
        (status = 200, description = "Generated prompt", body = DiscussionPromptResponse),
        (status = 400, description = "Topic missing"),
        (status = 500, description = "Generation failed")
    )
)]
pub async fn discussion_prompt_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<DiscussionPromptRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    state.staff_user(user_id).await?;
    let topic = req.topic.trim();
    if topic.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Topic is required".to_string()));
    }
    let prompt = state
        .discussion
        .generate_discussion_prompt(topic, req.grade_level.as_deref())
        .await
        .map_err(|e| port_failure("Failed to generate discussion prompt", e))?;
    Ok(Json(DiscussionPromptResponse { prompt }))
}

/// POST /functions/grade-short-answer - Judge a short answer
///
/// Falls back to a case-insensitive exact match when the AI grader fails.
#[utoipa::path(
    post,
    path = "/functions/grade-short-answer",
    request_body = GradeShortAnswerRequest,
    responses((status = 200, description = "Verdict", body = GradeShortAnswerResponse))
)]
pub async fn grade_short_answer_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<GradeShortAnswerRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    state.current_user(user_id).await?;
    let response = match state
        .grader
        .grade_short_answer(&req.prompt, &req.expected_answers, &req.answer)
        .await
    {
        Ok(is_correct) => GradeShortAnswerResponse {
            is_correct,
            fallback: false,
        },
        Err(e) => {
            warn!("AI grading failed, using exact match: {}", e);
            GradeShortAnswerResponse {
                is_correct: exact_match(&req.expected_answers, &req.answer),
                fallback: true,
            }
        }
    };
    Ok(Json(response))
}

/// POST /functions/translate - Translate text for a learner
#[utoipa::path(
    post,
    path = "/functions/translate",
    request_body = TranslateRequest,
    responses(
        (status = 200, description = "Translated text", body = TranslateResponse),
        (status = 400, description = "Empty text or language")
    )
)]
pub async fn translate_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<TranslateRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    state.current_user(user_id).await?;
    if req.text.trim().is_empty() || req.target_language.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Text and target_language are required".to_string(),
        ));
    }
    let translated_text = state
        .translator
        .translate(&req.text, req.target_language.trim())
        .await
        .map_err(|e| port_failure("Failed to translate", e))?;
    Ok(Json(TranslateResponse { translated_text }))
}

/// POST /functions/speak - Text to speech, returned as MP3
#[utoipa::path(
    post,
    path = "/functions/speak",
    request_body = SpeakRequest,
    responses(
        (status = 200, description = "audio/mpeg bytes"),
        (status = 400, description = "Empty text")
    )
)]
pub async fn speak_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SpeakRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    state.current_user(user_id).await?;
    if req.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Text is required".to_string()));
    }
    let audio = state
        .tts
        .generate_audio(&req.text)
        .await
        .map_err(|e| port_failure("Failed to generate speech", e))?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}
