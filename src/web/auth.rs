//! Signup, login and logout.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use super::AppState;
use super::error::ApiError;
use super::extract::ApiJson;
use super::session::{CurrentUser, start_session};

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// POST /signup
async fn signup(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let password = SecretString::from(body.password);
    let account = state.service.signup(&body.username, &password).await?;
    start_session(&session, account.id).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let password = SecretString::from(body.password);
    let account = state.service.login(&body.username, &password).await?;
    start_session(&session, account.id).await?;
    Ok(Json(account))
}

/// POST /logout
///
/// Flushing drops the account binding and the remembered view parameters.
async fn logout(user: CurrentUser) -> Result<StatusCode, ApiError> {
    user.session.flush().await?;
    info!(account_id = user.id, "Account logged out");
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}
