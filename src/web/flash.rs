//! Error context handed from a failing POST to `GET /error` through the
//! session. Written once, consumed by the first read.

use tower_sessions::Session;

pub const DUPLICATE_EMAIL_MESSAGE: &str = "Este email ya se encuentra registrado, prueba con otro";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Usuario o contraseña incorrectos";

const MESSAGE_KEY: &str = "message";
const ROUTE_KEY: &str = "route";
const FILE_NAME_KEY: &str = "fileName";

/// Pages the error screen may link back to.
const RETURN_ROUTES: [&str; 2] = ["register", "login"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub message: String,
    /// Route (without leading slash) the user should go back to.
    pub route: String,
    pub file_name: Option<String>,
}

impl ErrorContext {
    pub fn duplicate_email(file_name: String) -> Self {
        Self {
            message: DUPLICATE_EMAIL_MESSAGE.to_owned(),
            route: "register".to_owned(),
            file_name: Some(file_name),
        }
    }

    pub fn invalid_credentials() -> Self {
        Self {
            message: INVALID_CREDENTIALS_MESSAGE.to_owned(),
            route: "login".to_owned(),
            file_name: None,
        }
    }

    pub async fn write(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(MESSAGE_KEY, &self.message).await?;
        session.insert(ROUTE_KEY, &self.route).await?;
        match &self.file_name {
            Some(file_name) => session.insert(FILE_NAME_KEY, file_name).await?,
            None => {
                session.remove::<String>(FILE_NAME_KEY).await?;
            }
        }
        Ok(())
    }

    /// Removes the context from the session. `None` when no message was
    /// left there.
    pub async fn take(session: &Session) -> Result<Option<Self>, tower_sessions::session::Error> {
        let message = session.remove::<String>(MESSAGE_KEY).await?;
        let route = session.remove::<String>(ROUTE_KEY).await?;
        let file_name = session.remove::<String>(FILE_NAME_KEY).await?;

        Ok(message.map(|message| Self {
            message,
            route: route.unwrap_or_else(|| "login".to_owned()),
            file_name,
        }))
    }

    /// Path of the "go back" link. Unknown routes fall back to `/login`.
    pub fn return_path(&self) -> String {
        let route = RETURN_ROUTES
            .iter()
            .find(|known| **known == self.route)
            .copied()
            .unwrap_or("login");
        format!("/{route}")
    }
}
