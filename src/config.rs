//! Process-wide configuration, read once from the environment at startup.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_BROADCAST_DELAY_MS: u64 = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// How platform updates reach the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Telegram pushes updates to `POST /bot`.
    Webhook,
    /// The bot long-polls `getUpdates` itself.
    Polling,
}

impl UpdateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMode::Webhook => "webhook",
            UpdateMode::Polling => "polling",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_secret: String,
    pub required_channel: String,
    pub admin_ids: HashSet<i64>,
    pub channel_invite_url: Option<String>,
    pub listen_addr: SocketAddr,
    pub update_mode: UpdateMode,
    pub webhook_url: Option<Url>,
    pub broadcast_delay: Duration,
}

impl Config {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(error) = dotenvy::dotenv()
            && !error.not_found()
        {
            tracing::warn!(error = %error, "Failed to read .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bot_token = non_empty("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let api_secret = non_empty("API_SECRET").ok_or(ConfigError::Missing("API_SECRET"))?;
        let required_channel =
            non_empty("REQUIRED_CHANNEL").ok_or(ConfigError::Missing("REQUIRED_CHANNEL"))?;

        let admin_ids = parse_admin_ids(non_empty("ADMIN_IDS").as_deref().unwrap_or(""))?;

        let listen_addr = non_empty("LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "LISTEN_ADDR",
                reason: e.to_string(),
            })?;

        let update_mode = match non_empty("UPDATE_MODE")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("webhook") => UpdateMode::Webhook,
            Some("polling") => UpdateMode::Polling,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "UPDATE_MODE",
                    reason: format!("expected `webhook` or `polling`, got `{}`", other),
                });
            }
        };

        let broadcast_delay_ms = match non_empty("BROADCAST_DELAY_MS") {
            Some(value) => value.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: "BROADCAST_DELAY_MS",
                reason: e.to_string(),
            })?,
            None => DEFAULT_BROADCAST_DELAY_MS,
        };

        let webhook_url = match non_empty("WEBHOOK_URL") {
            Some(value) => Some(Url::parse(&value).map_err(|e| ConfigError::Invalid {
                name: "WEBHOOK_URL",
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            bot_token,
            api_secret,
            required_channel,
            admin_ids,
            channel_invite_url: non_empty("CHANNEL_INVITE_URL"),
            listen_addr,
            update_mode,
            webhook_url,
            broadcast_delay: Duration::from_millis(broadcast_delay_ms),
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// URL for the "join the channel" button, if one can be built.
    ///
    /// Numeric chat ids have no public `t.me` link, so those need an explicit
    /// `CHANNEL_INVITE_URL`.
    pub fn join_url(&self) -> Option<String> {
        if let Some(url) = &self.channel_invite_url {
            return Some(url.clone());
        }
        let name = self.required_channel.trim_start_matches('@');
        if name.is_empty() || name.parse::<i64>().is_ok() {
            return None;
        }
        Some(format!("https://t.me/{}", name))
    }
}

fn parse_admin_ids(raw: &str) -> Result<HashSet<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| ConfigError::Invalid {
                name: "ADMIN_IDS",
                reason: format!("`{}` is not a numeric user id", part),
            })
        })
        .collect()
}
