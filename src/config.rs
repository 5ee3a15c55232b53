//! Process configuration read from the environment.
//!
//! `main` loads a `.env` file (if any) with `dotenvy` before calling
//! [`Config::from_env`]. Notification channels are optional, but a channel
//! is either fully configured or not at all.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub session: SessionSettings,
    pub mail: Option<MailSettings>,
    pub whatsapp: Option<WhatsAppSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Sets the `Secure` attribute on the session cookie.
    pub secure: bool,
    /// Sessions expire after this long without a request.
    pub inactivity: Duration,
    /// Period of the expired-session deletion task.
    pub cleanup_interval: Duration,
}

/// HTTP mail relay used by [`crate::notify::EmailSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub relay_url: String,
    pub token: String,
    pub from: String,
    pub admin_email: String,
}

/// Twilio credentials used by [`crate::notify::WhatsAppSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub admin_to: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let database_url = vars
            .get("DATABASE_URL")
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let session = SessionSettings {
            secure: vars.parse("SESSION_SECURE", false)?,
            inactivity: Duration::from_secs(
                vars.parse::<u64>("SESSION_INACTIVITY_HOURS", 24)? * 3600,
            ),
            cleanup_interval: Duration::from_secs(vars.parse("SESSION_CLEANUP_SECS", 3600)?),
        };

        let mail = vars
            .group([
                "MAIL_RELAY_URL",
                "MAIL_RELAY_TOKEN",
                "MAIL_FROM",
                "ADMIN_EMAIL",
            ])?
            .map(|[relay_url, token, from, admin_email]| MailSettings {
                relay_url,
                token,
                from,
                admin_email,
            });

        let whatsapp = vars
            .group([
                "TWILIO_ACCOUNT_SID",
                "TWILIO_AUTH_TOKEN",
                "TWILIO_WHATSAPP_FROM",
                "ADMIN_WHATSAPP_TO",
            ])?
            .map(|[account_sid, auth_token, from, admin_to]| WhatsAppSettings {
                account_sid,
                auth_token,
                from,
                admin_to,
            });

        Ok(Self {
            host: vars.parse("HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: vars.parse("PORT", 8080)?,
            database_url,
            session,
            mail,
            whatsapp,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Empty values count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }

    /// All of `keys` or none of them.
    fn group<const N: usize>(
        &self,
        keys: [&'static str; N],
    ) -> Result<Option<[String; N]>, ConfigError> {
        let values = keys.map(|key| self.get(key));
        if values.iter().all(Option::is_none) {
            return Ok(None);
        }
        if let Some(missing) = keys
            .iter()
            .zip(values.iter())
            .find_map(|(key, value)| value.is_none().then_some(*key))
        {
            return Err(ConfigError::Missing(missing));
        }
        Ok(Some(values.map(Option::unwrap_or_default)))
    }
}
