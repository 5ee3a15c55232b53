use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::{current_user, pages, AppError, AppState};

/// `GET /home`
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    match current_user(&state, &session).await? {
        Some(user) => Ok(pages::home(&user).into_response()),
        None => Ok(Redirect::to("/login").into_response()),
    }
}
