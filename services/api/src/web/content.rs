//! services/api/src/web/content.rs
//!
//! Content library endpoints: create, edit with version history, publish
//! toggle, delete and filtered listing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use classroom_core::library::{self, publish_badge, ContentFilter, ContentForm};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{port_failure, validation_failure, HandlerError};
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct ContentEditRequest {
    #[serde(flatten)]
    pub form: ContentForm,
    #[serde(default)]
    pub changes_summary: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PublishResponse {
    pub content_id: Uuid,
    pub is_published: bool,
    /// "Published" or "Draft".
    pub badge: String,
}

/// GET /content - Search the content library
///
/// Filters by `query`, `content_type`, `subject`, `grade_level`, `tag` and
/// `published_only`. Students only ever see published items.
#[utoipa::path(
    get,
    path = "/content",
    responses((status = 200, description = "Matching items, newest first"))
)]
pub async fn list_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(mut filter): Query<ContentFilter>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.current_user(user_id).await?;
    if !user.role().is_staff() {
        filter.published_only = true;
    }
    let items = state
        .content
        .list_content()
        .await
        .map_err(|e| port_failure("Failed to list content", e))?;
    Ok(Json(filter.apply(items)))
}

/// POST /content - Create a content item (unpublished, version 1)
#[utoipa::path(
    post,
    path = "/content",
    responses(
        (status = 201, description = "Item created"),
        (status = 400, description = "Field validation errors"),
        (status = 403, description = "Staff access required")
    )
)]
pub async fn create_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(form): Json<ContentForm>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let valid = form.validate().map_err(validation_failure)?;
    let item = library::new_item(valid, user.id, Utc::now());
    let item = state
        .content
        .create_content(item)
        .await
        .map_err(|e| port_failure("Failed to create content", e))?;
    info!("Content {} created by {}", item.id, user.id);
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /content/{id} - Fetch one content item
#[utoipa::path(
    get,
    path = "/content/{id}",
    params(("id" = Uuid, Path, description = "Content id")),
    responses(
        (status = 200, description = "The item"),
        (status = 404, description = "Not found or not published")
    )
)]
pub async fn get_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(content_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.current_user(user_id).await?;
    let item = state
        .content
        .get_content(content_id)
        .await
        .map_err(|e| port_failure("Failed to load content", e))?;
    if !item.is_published && !user.role().is_staff() {
        return Err((StatusCode::NOT_FOUND, format!("Content {} not found", content_id)));
    }
    Ok(Json(item))
}

/// PUT /content/{id} - Edit an item, appending a version record
#[utoipa::path(
    put,
    path = "/content/{id}",
    params(("id" = Uuid, Path, description = "Content id")),
    responses(
        (status = 200, description = "Updated item with its version number advanced by one"),
        (status = 400, description = "Field validation errors"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(content_id): Path<Uuid>,
    Json(req): Json<ContentEditRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    let valid = req.form.validate().map_err(validation_failure)?;
    let current = state
        .content
        .get_content(content_id)
        .await
        .map_err(|e| port_failure("Failed to load content", e))?;

    let (item, version) = library::revise(&current, valid, req.changes_summary, Utc::now());
    state
        .content
        .save_revision(&item, &version)
        .await
        .map_err(|e| port_failure("Failed to save content", e))?;
    info!(
        "Content {} revised to version {} by {}",
        item.id, item.version_number, user.id
    );
    Ok(Json(item))
}

/// DELETE /content/{id} - Delete an item and its history
#[utoipa::path(
    delete,
    path = "/content/{id}",
    params(("id" = Uuid, Path, description = "Content id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(content_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = state.staff_user(user_id).await?;
    state
        .content
        .delete_content(content_id)
        .await
        .map_err(|e| port_failure("Failed to delete content", e))?;
    info!("Content {} deleted by {}", content_id, user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /content/{id}/publish - Toggle the publish state
#[utoipa::path(
    post,
    path = "/content/{id}/publish",
    params(("id" = Uuid, Path, description = "Content id")),
    responses(
        (status = 200, description = "New publish state", body = PublishResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn toggle_publish_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(content_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    state.staff_user(user_id).await?;
    let mut item = state
        .content
        .get_content(content_id)
        .await
        .map_err(|e| port_failure("Failed to load content", e))?;
    let badge = library::toggle_publish(&mut item);
    state
        .content
        .set_published(item.id, item.is_published)
        .await
        .map_err(|e| port_failure("Failed to update publish state", e))?;
    info!("Content {} is now {}", item.id, badge);
    Ok(Json(PublishResponse {
        content_id: item.id,
        is_published: item.is_published,
        badge: publish_badge(item.is_published).to_string(),
    }))
}

/// GET /content/{id}/versions - Version history, newest first
#[utoipa::path(
    get,
    path = "/content/{id}/versions",
    params(("id" = Uuid, Path, description = "Content id")),
    responses((status = 200, description = "Version records"))
)]
pub async fn list_versions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(content_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    state.staff_user(user_id).await?;
    let versions = state
        .content
        .list_versions(content_id)
        .await
        .map_err(|e| port_failure("Failed to list versions", e))?;
    Ok(Json(versions))
}
