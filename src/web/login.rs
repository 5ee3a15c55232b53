use axum::{
    extract::State,
    response::{Html, Redirect},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use super::{pages, AppError, AppState, ErrorContext, USER_ID_KEY};
use crate::credentials::verify_password;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// `GET /login`
pub async fn form() -> Html<String> {
    pages::login_form()
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, AppError> {
    let user = state
        .users
        .find_by_email(&form.email)
        .await?
        .filter(|user| verify_password(&form.password, &user.password));

    match user {
        Some(user) => {
            // New id on privilege change
            session.cycle_id().await?;
            session.insert(USER_ID_KEY, user.id).await?;
            info!(user_id = user.id, "user logged in");
            Ok(Redirect::to("/home"))
        }
        None => {
            ErrorContext::invalid_credentials().write(&session).await?;
            Ok(Redirect::to("/error"))
        }
    }
}

/// `GET /logout`
pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    session.flush().await?;
    Ok(Redirect::to("/login"))
}
