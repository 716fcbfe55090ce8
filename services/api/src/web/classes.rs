//! services/api/src/web/classes.rs
//!
//! Classes, their assignments, the per-class gradebook and the teacher
//! dashboard summary.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use classroom_core::domain::{Class, ClassAssignment, Role, User};
use classroom_core::gradebook::{build_gradebook, summarize_dashboard};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{port_failure, HandlerError};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct CreateClassRequest {
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateAssignmentRequest {
    pub title: String,
    #[serde(default)]
    pub lesson_id: Option<Uuid>,
    #[serde(default)]
    pub quiz_id: Option<Uuid>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

/// Loads a class the caller may manage: its teacher, or an admin.
async fn managed_class(state: &AppState, user: &User, class_id: Uuid) -> Result<Class, HandlerError> {
    let class = state
        .classes
        .get_class(class_id)
        .await
        .map_err(|e| port_failure("Failed to load class", e))?;
    let is_admin = matches!(user.role(), Role::Admin | Role::Developer);
    if class.teacher_id != user.id && !is_admin {
        return Err((StatusCode::FORBIDDEN, "This class belongs to another teacher".to_string()));
    }
    Ok(class)
}

/// GET /classes - Classes taught by the caller
#[utoipa::path(get, path = "/classes", responses((status = 200, description = "Classes")))]
pub async fn list_classes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let classes = state
        .classes
        .list_classes_for_teacher(user.id)
        .await
        .map_err(|e| port_failure("Failed to list classes", e))?;
    Ok(Json(classes))
}

/// POST /classes - Create a class taught by the caller
#[utoipa::path(
    post,
    path = "/classes",
    request_body = CreateClassRequest,
    responses((status = 201, description = "Class created"), (status = 400, description = "Name missing"))
)]
pub async fn create_class_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateClassRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Class name is required".to_string()));
    }
    let class = state
        .classes
        .create_class(Class {
            id: Uuid::new_v4(),
            name,
            teacher_id: user.id,
            subject: req.subject.filter(|s| !s.trim().is_empty()),
            grade_level: req.grade_level.filter(|g| !g.trim().is_empty()),
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| port_failure("Failed to create class", e))?;
    info!("Class {} created by {}", class.id, user.id);
    Ok((StatusCode::CREATED, Json(class)))
}

/// GET /classes/{id}/assignments - Assignments of a class
#[utoipa::path(
    get,
    path = "/classes/{id}/assignments",
    params(("id" = Uuid, Path, description = "Class id")),
    responses((status = 200, description = "Assignments"), (status = 403, description = "Not enrolled or not the teacher"))
)]
pub async fn list_assignments_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(class_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.current_user(user_id).await?;
    if user.role() == Role::Student {
        if !user.is_enrolled_in(class_id) {
            return Err((StatusCode::FORBIDDEN, "You are not enrolled in this class".to_string()));
        }
    } else {
        managed_class(&state, &user, class_id).await?;
    }
    let assignments = state
        .classes
        .list_assignments(class_id)
        .await
        .map_err(|e| port_failure("Failed to list assignments", e))?;
    Ok(Json(assignments))
}

/// POST /classes/{id}/assignments - Assign a lesson and/or quiz to a class
#[utoipa::path(
    post,
    path = "/classes/{id}/assignments",
    request_body = CreateAssignmentRequest,
    params(("id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 201, description = "Assignment created"),
        (status = 400, description = "Neither a lesson nor a quiz given"),
        (status = 404, description = "Class, lesson or quiz not found")
    )
)]
pub async fn create_assignment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(class_id): Path<Uuid>,
    Json(req): Json<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    managed_class(&state, &user, class_id).await?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Title is required".to_string()));
    }
    if req.lesson_id.is_none() && req.quiz_id.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            "An assignment needs a lesson or a quiz".to_string(),
        ));
    }
    if let Some(lesson_id) = req.lesson_id {
        state
            .lessons
            .get_lesson(lesson_id)
            .await
            .map_err(|e| port_failure("Failed to load lesson", e))?;
    }
    if let Some(quiz_id) = req.quiz_id {
        state
            .quizzes
            .get_quiz(quiz_id)
            .await
            .map_err(|e| port_failure("Failed to load quiz", e))?;
    }

    let assignment = state
        .classes
        .create_assignment(ClassAssignment {
            id: Uuid::new_v4(),
            class_id,
            title,
            lesson_id: req.lesson_id,
            quiz_id: req.quiz_id,
            due_at: req.due_at,
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| port_failure("Failed to create assignment", e))?;
    info!("Assignment {} added to class {}", assignment.id, class_id);
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// GET /classes/{id}/gradebook - Students x quiz assignments
#[utoipa::path(
    get,
    path = "/classes/{id}/gradebook",
    params(("id" = Uuid, Path, description = "Class id")),
    responses((status = 200, description = "Gradebook"), (status = 403, description = "Not the class teacher"))
)]
pub async fn gradebook_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(class_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    managed_class(&state, &user, class_id).await?;

    let assignments = state
        .classes
        .list_assignments(class_id)
        .await
        .map_err(|e| port_failure("Failed to list assignments", e))?;
    let students: Vec<User> = state
        .users
        .list_users(Some(Role::Student))
        .await
        .map_err(|e| port_failure("Failed to list students", e))?
        .into_iter()
        .filter(|s| s.is_enrolled_in(class_id))
        .collect();
    let quiz_ids: Vec<Uuid> = assignments.iter().filter_map(|a| a.quiz_id).collect();
    let attempts = if quiz_ids.is_empty() {
        Vec::new()
    } else {
        state
            .quizzes
            .list_attempts_for_quizzes(&quiz_ids)
            .await
            .map_err(|e| port_failure("Failed to list attempts", e))?
    };

    Ok(Json(build_gradebook(class_id, &students, &assignments, &attempts)))
}

/// GET /dashboard - Summary across the caller's classes
#[utoipa::path(get, path = "/dashboard", responses((status = 200, description = "Dashboard summary")))]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let classes = state
        .classes
        .list_classes_for_teacher(user.id)
        .await
        .map_err(|e| port_failure("Failed to list classes", e))?;

    let mut assignments = Vec::new();
    for class in &classes {
        assignments.extend(
            state
                .classes
                .list_assignments(class.id)
                .await
                .map_err(|e| port_failure("Failed to list assignments", e))?,
        );
    }
    let quiz_ids: Vec<Uuid> = assignments.iter().filter_map(|a| a.quiz_id).collect();
    let attempts = if quiz_ids.is_empty() {
        Vec::new()
    } else {
        state
            .quizzes
            .list_attempts_for_quizzes(&quiz_ids)
            .await
            .map_err(|e| port_failure("Failed to list attempts", e))?
    };

    Ok(Json(summarize_dashboard(&classes, &assignments, &attempts)))
}
