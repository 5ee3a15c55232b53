use async_trait::async_trait;
use serde::Serialize;

use super::{new_user_message, NotificationSink, NotifyError};
use crate::config::MailSettings;
use crate::users::User;

const SUBJECT: &str = "Nuevo registro";

/// Sends the new-user notice to the admin mailbox through an HTTP mail
/// relay (`POST` of a JSON message with a bearer token).
#[derive(Debug, Clone)]
pub struct EmailSink {
    client: reqwest::Client,
    settings: MailSettings,
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: String,
}

impl EmailSink {
    pub fn new(client: reqwest::Client, settings: MailSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, user: &User) -> Result<(), NotifyError> {
        let mail = OutgoingMail {
            from: &self.settings.from,
            to: &self.settings.admin_email,
            subject: SUBJECT,
            text: new_user_message(user),
        };

        let response = self
            .client
            .post(&self.settings.relay_url)
            .bearer_auth(&self.settings.token)
            .json(&mail)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(format!(
                "mail relay answered {}",
                response.status()
            )));
        }

        Ok(())
    }
}
