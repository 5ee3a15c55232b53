//! New-account registration.
//!
//! [`Registrar::register`] decides the outcome and performs the side
//! effects; turning that outcome into session state and a redirect is
//! left to the HTTP layer ([`crate::web::register`]).

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::credentials::hash_password;
use crate::notify::Notifier;
use crate::users::{NewUser, User, UserStore, UserStoreError};

/// Country code prepended to the locally-formatted phone number.
pub const PHONE_PREFIX: &str = "+549";

/// Body of `POST /register`, keyed by the form's field names.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "edad")]
    pub age: i32,
    #[serde(rename = "telefono")]
    pub phone: String,
    /// Photo saved by the upload step before the form was submitted.
    #[serde(rename = "fileName", default)]
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Created(User),
    /// Nothing was stored. Carries the submitted photo so the form can be
    /// offered again with it.
    DuplicateEmail { file_name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Store(#[from] UserStoreError),
}

/// Full international phone for a local number. Plain concatenation, no
/// other normalization.
pub fn international_phone(local: &str) -> String {
    format!("{PHONE_PREFIX}{local}")
}

#[derive(Clone)]
pub struct Registrar {
    users: Arc<dyn UserStore>,
    notifier: Notifier,
}

impl Registrar {
    pub fn new(users: Arc<dyn UserStore>, notifier: Notifier) -> Self {
        Self { users, notifier }
    }

    /// Registers a new account unless the email is already taken.
    ///
    /// The lookup is only a fast path: the store rejects a duplicate email
    /// atomically on insert, and that rejection yields the same
    /// [`RegistrationOutcome::DuplicateEmail`]. Notifications are queued
    /// after the insert commits and are never awaited.
    pub async fn register(
        &self,
        form: RegistrationForm,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        if self
            .users
            .find_by_email(&form.email)
            .await?
            .is_some()
        {
            return Ok(RegistrationOutcome::DuplicateEmail {
                file_name: form.file_name,
            });
        }

        let new_user = NewUser {
            password: hash_password(&form.password),
            phone: international_phone(&form.phone),
            name: form.name,
            address: form.address,
            age: form.age,
            email: form.email,
            photo: form.file_name.clone(),
        };

        let user = match self.users.insert(new_user).await {
            Ok(user) => user,
            Err(UserStoreError::DuplicateEmail(email)) => {
                info!(%email, "lost registration race for email");
                return Ok(RegistrationOutcome::DuplicateEmail {
                    file_name: form.file_name,
                });
            }
            Err(err) => return Err(err.into()),
        };

        info!(user_id = user.id, email = %user.email, "registered new user");
        self.notifier.enqueue(user.clone());

        Ok(RegistrationOutcome::Created(user))
    }
}
