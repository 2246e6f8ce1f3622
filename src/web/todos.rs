//! Todo endpoints, including the filtered listing.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::ApiError;
use super::extract::{ApiJson, ApiPath};
use super::session::CurrentUser;
use crate::service::{TagInput, TodoInput};
use crate::tags::Tag;
use crate::tags::model::split_tag_input;
use crate::todos::{EffectiveParams, TodoView, ViewQuery};

/// Create/update payload. `tags` is free text ("work, home"); `tag_ids`
/// picks existing tags.
#[derive(Debug, Default, Deserialize)]
pub struct TodoBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub tag_ids: Option<Vec<i64>>,
}

impl From<TodoBody> for TodoInput {
    fn from(body: TodoBody) -> Self {
        let tags = if body.tags.is_some() || body.tag_ids.is_some() {
            Some(TagInput {
                names: body.tags.as_deref().map(split_tag_input).unwrap_or_default(),
                ids: body.tag_ids.unwrap_or_default(),
            })
        } else {
            None
        };
        TodoInput {
            name: body.name,
            description: body.description,
            tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletedBody {
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct Listing {
    pub todos: Vec<TodoView>,
    pub tags: Vec<Tag>,
    pub params: EffectiveParams,
}

/// GET /todos?filter=&sort=&tags=
///
/// Missing parameters fall back to the session's remembered values. The
/// effective values are written back for the next request.
async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ViewQuery>,
) -> Result<Json<Listing>, ApiError> {
    let prefs = user.view_prefs().await?;
    let params = EffectiveParams::resolve(&query, &prefs);

    let todos = state.service.build_view(user.id, &params).await?;
    let tags = state.service.list_tags(user.id).await?;
    user.remember_view_prefs(&params.to_prefs()).await?;

    Ok(Json(Listing { todos, tags, params }))
}

/// POST /todos
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<TodoBody>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.service.create_todo(user.id, body.into()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /todos/{id}
async fn show(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<TodoView>, ApiError> {
    Ok(Json(state.service.get_todo(user.id, id).await?))
}

/// PUT /todos/{id}
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<TodoBody>,
) -> Result<Json<TodoView>, ApiError> {
    Ok(Json(state.service.update_todo(user.id, id, body.into()).await?))
}

/// DELETE /todos/{id}
async fn destroy(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_todo(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /todos/{id}/completed
async fn set_completed(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CompletedBody>,
) -> Result<Json<TodoView>, ApiError> {
    Ok(Json(
        state.service.set_completed(user.id, id, body.completed).await?,
    ))
}

/// POST /todos/{id}/toggle
async fn toggle(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<TodoView>, ApiError> {
    Ok(Json(state.service.toggle_completed(user.id, id).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list).post(create))
        .route("/todos/{id}", get(show).put(update).delete(destroy))
        .route("/todos/{id}/completed", put(set_completed))
        .route("/todos/{id}/toggle", post(toggle))
}
