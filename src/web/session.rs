//! Session keys and the authenticated-user extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tower_sessions::Session;

use super::error::ApiError;
use crate::todos::ViewPrefs;

/// Session key holding the logged-in account id.
pub const USER_ID_KEY: &str = "user_id";

/// Session key holding the last effective view parameters.
pub const VIEW_PREFS_KEY: &str = "view_prefs";

/// The logged-in account, plus the session it came from.
pub struct CurrentUser {
    pub id: i64,
    pub session: Session,
}

impl CurrentUser {
    pub async fn view_prefs(&self) -> Result<ViewPrefs, ApiError> {
        Ok(self
            .session
            .get::<ViewPrefs>(VIEW_PREFS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn remember_view_prefs(&self, prefs: &ViewPrefs) -> Result<(), ApiError> {
        self.session.insert(VIEW_PREFS_KEY, prefs).await?;
        Ok(())
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| ApiError::Session(msg.to_string()))?;
        let id = session
            .get::<i64>(USER_ID_KEY)
            .await?
            .ok_or(ApiError::Unauthenticated)?;
        Ok(Self { id, session })
    }
}

/// Bind the session to an account. The id is cycled and stale view
/// preferences from a previous login are dropped.
pub async fn start_session(session: &Session, account_id: i64) -> Result<(), ApiError> {
    session.cycle_id().await?;
    session.remove::<ViewPrefs>(VIEW_PREFS_KEY).await?;
    session.insert(USER_ID_KEY, account_id).await?;
    Ok(())
}
