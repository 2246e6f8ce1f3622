//! Tag endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;
use super::extract::{ApiJson, ApiPath};
use super::session::CurrentUser;
use crate::tags::Tag;

#[derive(Debug, Deserialize)]
pub struct TagBody {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// GET /tags
async fn list(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.service.list_tags(user.id).await?))
}

/// POST /tags
///
/// 201 with the new tag, or 200 with the existing one when the name is
/// already taken by this owner.
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<TagBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (tag, created) = state
        .service
        .create_tag(user.id, &body.name, body.color.as_deref())
        .await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(tag)))
}

/// PUT /tags/{id}
async fn rename(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<TagBody>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(
        state
            .service
            .rename_tag(user.id, id, &body.name, body.color.as_deref())
            .await?,
    ))
}

/// DELETE /tags/{id}
async fn destroy(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_tag(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list).post(create))
        .route("/tags/{id}", put(rename).delete(destroy))
}
