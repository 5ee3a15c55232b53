use async_trait::async_trait;

use super::{new_user_message, NotificationSink, NotifyError};
use crate::config::WhatsAppSettings;
use crate::users::User;

const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";

/// Sends the new-user notice to the admin's WhatsApp through the Twilio
/// Messages API.
#[derive(Debug, Clone)]
pub struct WhatsAppSink {
    client: reqwest::Client,
    settings: WhatsAppSettings,
}

impl WhatsAppSink {
    pub fn new(client: reqwest::Client, settings: WhatsAppSettings) -> Self {
        Self { client, settings }
    }

    fn messages_url(&self) -> String {
        format!(
            "{TWILIO_API}/Accounts/{}/Messages.json",
            self.settings.account_sid
        )
    }
}

#[async_trait]
impl NotificationSink for WhatsAppSink {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn notify(&self, user: &User) -> Result<(), NotifyError> {
        let from = whatsapp_address(&self.settings.from);
        let to = whatsapp_address(&self.settings.admin_to);
        let body = new_user_message(user);

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[("From", from.as_str()), ("To", to.as_str()), ("Body", body.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(format!(
                "twilio answered {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Twilio routes to WhatsApp only for `whatsapp:`-prefixed numbers.
fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_owned()
    } else {
        format!("whatsapp:{number}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_get_the_whatsapp_prefix_once() {
        assert_eq!(whatsapp_address("+5491100000000"), "whatsapp:+5491100000000");
        assert_eq!(
            whatsapp_address("whatsapp:+14155238886"),
            "whatsapp:+14155238886"
        );
    }
}
