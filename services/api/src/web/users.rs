//! services/api/src/web/users.rs
//!
//! User administration: create users with a role profile, list by role,
//! activate or deactivate, and reset passwords. Admins and developers only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use classroom_core::domain::{Role, UserStatus};
use classroom_core::ports::NewUserRecord;
use classroom_core::users::{validate_password, UserForm};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{port_failure, validation_failure, HandlerError};
use crate::web::auth::{hash_password, password_failure};
use crate::web::state::AppState;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Restrict the list to one role.
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusRequest {
    /// `active` or `inactive`.
    pub status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub password: String,
}

/// GET /users - List users, optionally by role
#[utoipa::path(
    get,
    path = "/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users sorted by name"),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Administrator access required")
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    state.admin_user(user_id).await?;
    let role = match query.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => Some(
            Role::parse(raw)
                .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Unknown role '{}'", raw)))?,
        ),
        None => None,
    };
    let users = state
        .users
        .list_users(role)
        .await
        .map_err(|e| port_failure("Failed to list users", e))?;
    Ok(Json(users))
}

/// POST /users - Create a user with a role-specific profile
///
/// Takes the flat user form: email, password, first_name, last_name, role and
/// the optional profile fields for that role.
#[utoipa::path(
    post,
    path = "/users",
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Field validation errors"),
        (status = 403, description = "Administrator access required"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(form): Json<UserForm>,
) -> Result<impl IntoResponse, HandlerError> {
    let admin = state.admin_user(user_id).await?;
    let new_user = form.validate().map_err(validation_failure)?;
    let hashed_password = hash_password(&new_user.password)?;

    let user = state
        .users
        .create_user(NewUserRecord {
            email: new_user.email,
            hashed_password,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            profile: new_user.profile,
        })
        .await
        .map_err(|e| port_failure("Failed to create user", e))?;

    info!("User {} ({}) created by {}", user.id, user.role(), admin.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /users/{id}/status - Activate or deactivate a user
#[utoipa::path(
    put,
    path = "/users/{id}/status",
    request_body = StatusRequest,
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Status updated"),
        (status = 400, description = "Unknown status or self-deactivation"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(target_id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    state.admin_user(user_id).await?;
    let status = UserStatus::parse(req.status.trim()).ok_or_else(|| {
        (StatusCode::BAD_REQUEST, format!("Unknown status '{}'", req.status))
    })?;
    if target_id == user_id && status == UserStatus::Inactive {
        return Err((StatusCode::BAD_REQUEST, "You cannot deactivate your own account".to_string()));
    }
    state
        .users
        .update_user_status(target_id, status)
        .await
        .map_err(|e| port_failure("Failed to update user status", e))?;
    info!("User {} set to {}", target_id, status.as_str());
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/{id}/password - Reset a user's password
#[utoipa::path(
    post,
    path = "/users/{id}/password",
    request_body = PasswordResetRequest,
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Password reset"),
        (status = 400, description = "Password too short"),
        (status = 404, description = "User not found")
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(target_id): Path<Uuid>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    state.admin_user(user_id).await?;
    validate_password(&req.password).map_err(password_failure)?;
    let hashed = hash_password(&req.password)?;
    state
        .users
        .update_password(target_id, &hashed)
        .await
        .map_err(|e| port_failure("Failed to reset password", e))?;
    info!("Password reset for user {}", target_id);
    Ok(StatusCode::NO_CONTENT)
}
