//! Session routes

use axum::{Router, extract::State, routing::post};
use shared::{AppError, AppResult, DataResponse, MessageKey};

use crate::auth::CurrentUser;
use crate::security_log;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/authen/logout", post(logout))
}

/// POST /authen/logout - end the caller's live session
async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<DataResponse> {
    state.sessions.close(&user.username).await.map_err(|e| {
        tracing::error!(error = %e, username = %user.username, "Failed to close session");
        AppError::system_error()
    })?;

    security_log!(INFO, "logout", username = %user.username, ip = %user.ip_address);
    Ok(DataResponse::done(MessageKey::LogoutSuccess))
}
