//! HTTP surface.
//!
//! ```text
//! GET  /register      registration form
//! POST /register      create account, redirect to /login or /error
//! GET  /login         login form
//! POST /login         start session, redirect to /home or /error
//! GET  /logout        drop session
//! GET  /error         show (and consume) the error context in the session
//! GET  /home          profile of the logged-in user
//! GET  /cart          cart of the logged-in user
//! POST /cart          add an item
//! POST /cart/clear    empty the cart
//! *                   redirect to /login
//! ```

mod cart;
mod error_page;
mod flash;
mod home;
mod login;
mod pages;
mod register;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use tower_sessions::{cookie::SameSite, Expiry, Session, SessionManagerLayer, SessionStore};
use tracing::error;

use crate::config::SessionSettings;
use crate::registration::{RegistrationError, Registrar};
use crate::users::{User, UserStore, UserStoreError};

pub use cart::CartItem;
pub use flash::{ErrorContext, DUPLICATE_EMAIL_MESSAGE, INVALID_CREDENTIALS_MESSAGE};
pub use register::register;

/// Session key holding the logged-in user's id.
pub const USER_ID_KEY: &str = "user_id";

/// Shared by every handler of a process.
#[derive(Clone)]
pub struct AppState {
    pub registrar: Registrar,
    pub users: Arc<dyn UserStore>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Users(#[from] UserStoreError),

    #[error("session failure: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, pages::server_error()).into_response()
    }
}

/// Routes without the session layer; [`app`] adds it.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", get(register::form).post(register::register))
        .route("/login", get(login::form).post(login::login))
        .route("/logout", get(login::logout))
        .route("/error", get(error_page::show))
        .route("/home", get(home::show))
        .route("/cart", get(cart::show).post(cart::add))
        .route("/cart/clear", post(cart::clear))
        .fallback(fallback)
        .with_state(state)
}

/// The complete application: routes plus session management backed by
/// `store`.
pub fn app<S>(state: AppState, store: S, settings: &SessionSettings) -> Router
where
    S: SessionStore + Clone,
{
    let inactivity = time::Duration::try_from(settings.inactivity).unwrap_or(time::Duration::MAX);

    let session_layer = SessionManagerLayer::new(store)
        .with_secure(settings.secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(inactivity));

    router(state).layer(session_layer)
}

async fn fallback() -> Redirect {
    Redirect::to("/login")
}

/// The logged-in user, if the session names one that still exists.
async fn current_user(state: &AppState, session: &Session) -> Result<Option<User>, AppError> {
    let Some(id) = session.get::<i32>(USER_ID_KEY).await? else {
        return Ok(None);
    };
    Ok(state.users.find_by_id(id).await?)
}
