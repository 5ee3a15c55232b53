use axum::response::{Html, IntoResponse, Redirect, Response};
use tower_sessions::Session;

use super::{pages, AppError, ErrorContext};

/// `GET /error`
///
/// Shows the context left by the previous request and removes it, so a
/// reload without a fresh error goes back to the login page.
pub async fn show(session: Session) -> Result<Response, AppError> {
    let Some(context) = ErrorContext::take(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let page: Html<String> = pages::error_page(
        &context.message,
        &context.return_path(),
        context.file_name.as_deref(),
    );
    Ok(page.into_response())
}
