//! services/api/src/web/lessons.rs
//!
//! Lesson builder endpoints. Components are created at the end of the lesson,
//! edited per field or through the generic JSON editor, toggled, reordered and
//! deleted. Students only see enabled components, rendered by their viewer.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use classroom_core::domain::{Lesson, LessonComponent, User};
use classroom_core::lesson::{
    self, apply_field_edit, apply_json_edit, editor_for, render, ComponentType, ComponentView,
    LessonComponentContent,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{content_failure, port_failure, HandlerError};
use crate::web::state::AppState;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateLessonRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateComponentRequest {
    pub component_type: String,
    pub title: String,
    /// Initial content for the type; omitted means the type's empty content.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub content: Option<serde_json::Value>,
    #[serde(default)]
    pub is_assignable: bool,
    #[serde(default)]
    pub reading_level: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub read_aloud: bool,
}

/// Metadata changes. Absent fields are left alone.
#[derive(Deserialize, ToSchema)]
pub struct UpdateComponentRequest {
    pub title: Option<String>,
    pub enabled: Option<bool>,
    pub is_assignable: Option<bool>,
    pub reading_level: Option<String>,
    pub language_code: Option<String>,
    pub read_aloud: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct FieldEditRequest {
    pub field: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

#[derive(Deserialize, ToSchema)]
pub struct JsonEditRequest {
    /// Raw JSON text from the generic editor.
    pub text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub component_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct LessonDetail {
    pub lesson: Lesson,
    pub components: Vec<ComponentView>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn load_component(state: &AppState, component_id: Uuid) -> Result<LessonComponent, HandlerError> {
    state
        .lessons
        .get_component(component_id)
        .await
        .map_err(|e| port_failure("Failed to load component", e))
}

async fn save_component(
    state: &AppState,
    component: &LessonComponent,
    user: &User,
) -> Result<(), HandlerError> {
    state
        .lessons
        .save_component(component)
        .await
        .map_err(|e| port_failure("Failed to save component", e))?;
    info!("Component {} saved by {}", component.id, user.id);
    Ok(())
}

//=========================================================================================
// Lessons
//=========================================================================================

/// GET /lessons - List lessons
#[utoipa::path(get, path = "/lessons", responses((status = 200, description = "Lessons, newest first")))]
pub async fn list_lessons_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    state.current_user(user_id).await?;
    let lessons = state
        .lessons
        .list_lessons()
        .await
        .map_err(|e| port_failure("Failed to list lessons", e))?;
    Ok(Json(lessons))
}

/// POST /lessons - Create a lesson
#[utoipa::path(
    post,
    path = "/lessons",
    request_body = CreateLessonRequest,
    responses(
        (status = 201, description = "Lesson created"),
        (status = 400, description = "Title missing"),
        (status = 403, description = "Staff access required")
    )
)]
pub async fn create_lesson_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Title is required".to_string()));
    }
    let lesson = state
        .lessons
        .create_lesson(Lesson {
            id: Uuid::new_v4(),
            title,
            description: blank_to_none(req.description),
            subject: blank_to_none(req.subject),
            grade_level: blank_to_none(req.grade_level),
            created_by: user.id,
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| port_failure("Failed to create lesson", e))?;
    info!("Lesson {} created by {}", lesson.id, user.id);
    Ok((StatusCode::CREATED, Json(lesson)))
}

/// GET /lessons/{id} - A lesson with its enabled components rendered for viewing
#[utoipa::path(
    get,
    path = "/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson and component views in display order"),
        (status = 404, description = "Lesson not found")
    )
)]
pub async fn get_lesson_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    state.current_user(user_id).await?;
    let lesson = state
        .lessons
        .get_lesson(lesson_id)
        .await
        .map_err(|e| port_failure("Failed to load lesson", e))?;
    let components = state
        .lessons
        .list_components(lesson_id)
        .await
        .map_err(|e| port_failure("Failed to load components", e))?;
    let components = lesson::deliverable(&components)
        .into_iter()
        .map(render)
        .collect();
    Ok(Json(LessonDetail { lesson, components }))
}

//=========================================================================================
// Components
//=========================================================================================

/// GET /lessons/{id}/components - All components, including disabled ones
#[utoipa::path(
    get,
    path = "/lessons/{id}/components",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses((status = 200, description = "Components sorted by order"))
)]
pub async fn list_components_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    state.staff_user(user_id).await?;
    let components = state
        .lessons
        .list_components(lesson_id)
        .await
        .map_err(|e| port_failure("Failed to load components", e))?;
    Ok(Json(components))
}

/// POST /lessons/{id}/components - Append a component to the lesson
#[utoipa::path(
    post,
    path = "/lessons/{id}/components",
    request_body = CreateComponentRequest,
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 201, description = "Component created"),
        (status = 400, description = "Malformed content for the component type"),
        (status = 404, description = "Lesson not found")
    )
)]
pub async fn create_component_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(lesson_id): Path<Uuid>,
    Json(req): Json<CreateComponentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let tag = req.component_type.trim();
    if tag.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "component_type is required".to_string()));
    }
    let component_type = ComponentType::parse(tag);
    let content = match req.content {
        Some(value) => LessonComponentContent::decode(&component_type, value).map_err(content_failure)?,
        None => LessonComponentContent::default_for(&component_type),
    };

    state
        .lessons
        .get_lesson(lesson_id)
        .await
        .map_err(|e| port_failure("Failed to load lesson", e))?;
    let existing = state
        .lessons
        .list_components(lesson_id)
        .await
        .map_err(|e| port_failure("Failed to load components", e))?;

    if !component_type.is_known() {
        warn!("Lesson {} gets a component of unknown type '{}'", lesson_id, component_type);
    }
    let component = LessonComponent {
        id: Uuid::new_v4(),
        lesson_id,
        component_type,
        title: req.title.trim().to_string(),
        content,
        order: lesson::next_order(&existing),
        enabled: true,
        is_assignable: req.is_assignable,
        reading_level: blank_to_none(req.reading_level),
        language_code: blank_to_none(req.language_code),
        read_aloud: req.read_aloud,
    };
    save_component(&state, &component, &user).await?;
    Ok((StatusCode::CREATED, Json(component)))
}

/// PUT /lessons/{id}/components/order - Reorder every component of a lesson
#[utoipa::path(
    put,
    path = "/lessons/{id}/components/order",
    request_body = ReorderRequest,
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Components in their new order"),
        (status = 400, description = "Ids are not a permutation of the lesson's components")
    )
)]
pub async fn reorder_components_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(lesson_id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    state.staff_user(user_id).await?;
    let mut components = state
        .lessons
        .list_components(lesson_id)
        .await
        .map_err(|e| port_failure("Failed to load components", e))?;
    let orders = lesson::reorder(&mut components, &req.component_ids).map_err(content_failure)?;
    state
        .lessons
        .update_component_orders(&orders)
        .await
        .map_err(|e| port_failure("Failed to reorder components", e))?;
    Ok(Json(components))
}

/// GET /components/{id} - One component as stored
#[utoipa::path(
    get,
    path = "/components/{id}",
    params(("id" = Uuid, Path, description = "Component id")),
    responses((status = 200, description = "The component"), (status = 404, description = "Not found"))
)]
pub async fn get_component_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(component_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    state.staff_user(user_id).await?;
    Ok(Json(load_component(&state, component_id).await?))
}

/// PUT /components/{id} - Update title, flags and accessibility settings
#[utoipa::path(
    put,
    path = "/components/{id}",
    request_body = UpdateComponentRequest,
    params(("id" = Uuid, Path, description = "Component id")),
    responses((status = 200, description = "Updated component"), (status = 404, description = "Not found"))
)]
pub async fn update_component_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(component_id): Path<Uuid>,
    Json(req): Json<UpdateComponentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let mut component = load_component(&state, component_id).await?;

    if let Some(title) = req.title {
        component.title = title.trim().to_string();
    }
    if let Some(enabled) = req.enabled {
        component.enabled = enabled;
    }
    if let Some(is_assignable) = req.is_assignable {
        component.is_assignable = is_assignable;
    }
    if req.reading_level.is_some() {
        component.reading_level = blank_to_none(req.reading_level);
    }
    if req.language_code.is_some() {
        component.language_code = blank_to_none(req.language_code);
    }
    if let Some(read_aloud) = req.read_aloud {
        component.read_aloud = read_aloud;
    }

    save_component(&state, &component, &user).await?;
    Ok(Json(component))
}

/// DELETE /components/{id} - Delete a component and close the gap in ordering
#[utoipa::path(
    delete,
    path = "/components/{id}",
    params(("id" = Uuid, Path, description = "Component id")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not found"))
)]
pub async fn delete_component_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(component_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let component = load_component(&state, component_id).await?;
    state
        .lessons
        .delete_component(component_id)
        .await
        .map_err(|e| port_failure("Failed to delete component", e))?;

    let mut remaining = state
        .lessons
        .list_components(component.lesson_id)
        .await
        .map_err(|e| port_failure("Failed to load components", e))?;
    let changed = lesson::renormalize(&mut remaining);
    if !changed.is_empty() {
        state
            .lessons
            .update_component_orders(&changed)
            .await
            .map_err(|e| port_failure("Failed to reorder components", e))?;
    }
    info!("Component {} deleted by {}", component_id, user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /components/{id}/fields - Edit one field of the typed content
#[utoipa::path(
    post,
    path = "/components/{id}/fields",
    request_body = FieldEditRequest,
    params(("id" = Uuid, Path, description = "Component id")),
    responses(
        (status = 200, description = "Updated component"),
        (status = 400, description = "Unknown field or value of the wrong type; content unchanged")
    )
)]
pub async fn edit_field_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(component_id): Path<Uuid>,
    Json(req): Json<FieldEditRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let mut component = load_component(&state, component_id).await?;
    apply_field_edit(&mut component, &req.field, req.value).map_err(content_failure)?;
    save_component(&state, &component, &user).await?;
    Ok(Json(component))
}

/// POST /components/{id}/json - Replace content from the generic JSON editor
#[utoipa::path(
    post,
    path = "/components/{id}/json",
    request_body = JsonEditRequest,
    params(("id" = Uuid, Path, description = "Component id")),
    responses(
        (status = 200, description = "Updated component"),
        (status = 400, description = "Invalid JSON or malformed content; content unchanged")
    )
)]
pub async fn edit_json_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(component_id): Path<Uuid>,
    Json(req): Json<JsonEditRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let mut component = load_component(&state, component_id).await?;
    apply_json_edit(&mut component, &req.text).map_err(content_failure)?;
    save_component(&state, &component, &user).await?;
    Ok(Json(component))
}

/// GET /components/{id}/view - The component rendered by its viewer
#[utoipa::path(
    get,
    path = "/components/{id}/view",
    params(("id" = Uuid, Path, description = "Component id")),
    responses((status = 200, description = "Viewer payload"), (status = 404, description = "Not found"))
)]
pub async fn view_component_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(component_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.current_user(user_id).await?;
    let component = load_component(&state, component_id).await?;
    if !component.enabled && !user.role().is_staff() {
        return Err((StatusCode::NOT_FOUND, format!("Component {} not found", component_id)));
    }
    Ok(Json(render(&component)))
}

/// GET /component-types/{tag}/editor - The editor and field list for a type tag
#[utoipa::path(
    get,
    path = "/component-types/{tag}/editor",
    params(("tag" = String, Path, description = "Component type tag")),
    responses((status = 200, description = "Editor kind and fields; unknown tags get the JSON editor"))
)]
pub async fn editor_handler(Path(tag): Path<String>) -> impl IntoResponse {
    Json(editor_for(&ComponentType::parse(tag.trim())))
}
