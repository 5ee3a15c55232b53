use axum::{
    extract::State,
    response::{Html, Redirect},
    Form,
};
use tower_sessions::Session;

use super::{pages, AppError, AppState, ErrorContext};
use crate::registration::{RegistrationForm, RegistrationOutcome};

/// `GET /register`
pub async fn form() -> Html<String> {
    pages::register_form()
}

/// `POST /register`
///
/// A taken email leaves the error context in the session and sends the
/// client to `/error`; a new account goes on to `/login`.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegistrationForm>,
) -> Result<Redirect, AppError> {
    match state.registrar.register(form).await? {
        RegistrationOutcome::Created(_) => Ok(Redirect::to("/login")),
        RegistrationOutcome::DuplicateEmail { file_name } => {
            ErrorContext::duplicate_email(file_name)
                .write(&session)
                .await?;
            Ok(Redirect::to("/error"))
        }
    }
}
