//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use classroom_core::domain::{Role, UserStatus};
use classroom_core::ports::NewUserRecord;
use classroom_core::users::{UserForm, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{port_failure, validation_failure, HandlerError};
use crate::web::state::AppState;

const SESSION_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Self-service signup. Only students and teachers can sign themselves up.
#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// `student` (default) or `teacher`.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub subject_areas: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Hashes a password with Argon2 and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, HandlerError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })
}

pub fn verify_password(password: &str, hashed: &str) -> Result<bool, HandlerError> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn session_cookie(auth_session_id: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    )
}

/// Pulls the auth session id out of the `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, HandlerError> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .users
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;
    Ok(session_cookie(&auth_session_id))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new student or teacher account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Role cannot be self-assigned"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let role = req.role.unwrap_or_else(|| Role::Student.as_str().to_string());
    if !matches!(Role::parse(role.trim()), Some(Role::Student | Role::Teacher) | None) {
        return Err((
            StatusCode::FORBIDDEN,
            "Only student and teacher accounts can be created by signup".to_string(),
        ));
    }

    let form = UserForm {
        email: req.email,
        password: req.password,
        first_name: req.first_name,
        last_name: req.last_name,
        role,
        grade_level: req.grade_level,
        district: req.district,
        subject_areas: req.subject_areas,
        ..UserForm::default()
    };
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

    let cookie = start_session(&state, user.id).await?;
    info!("New {} account created: {}", user.role(), user.id);

    let response = AuthResponse {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role().to_string(),
    };
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account inactive"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());

    let user_creds = state.users.get_user_by_email(&req.email).await.map_err(|e| {
        error!("Failed to get user: {:?}", e);
        invalid()
    })?;

    if !verify_password(&req.password, &user_creds.hashed_password)? {
        return Err(invalid());
    }
    if user_creds.status != UserStatus::Active {
        return Err((StatusCode::FORBIDDEN, "This account is inactive".to_string()));
    }

    let user = state
        .users
        .get_user(user_creds.user_id)
        .await
        .map_err(|e| port_failure("Failed to load user", e))?;
    let cookie = start_session(&state, user.id).await?;

    let response = AuthResponse {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role().to_string(),
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .users
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

/// Password rule failures are reported like any other form error.
pub fn password_failure(e: ValidationError) -> HandlerError {
    validation_failure(vec![e])
}
