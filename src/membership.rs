//! Channel membership lookup over the Bot API `getChatMember` call.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberStatus, Recipient};
use teloxide::{ApiError, RequestError};
use thiserror::Error;

/// A user's relationship to the required channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    /// Platform status "creator".
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    /// Platform status "kicked".
    Banned,
}

impl MembershipStatus {
    /// Only owners, administrators and plain members count; restricted users
    /// are treated as outsiders.
    pub fn is_member(self) -> bool {
        matches!(self, Self::Owner | Self::Administrator | Self::Member)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "creator",
            Self::Administrator => "administrator",
            Self::Member => "member",
            Self::Restricted => "restricted",
            Self::Left => "left",
            Self::Banned => "kicked",
        }
    }
}

impl From<ChatMemberStatus> for MembershipStatus {
    fn from(status: ChatMemberStatus) -> Self {
        match status {
            ChatMemberStatus::Owner => Self::Owner,
            ChatMemberStatus::Administrator => Self::Administrator,
            ChatMemberStatus::Member => Self::Member,
            ChatMemberStatus::Restricted => Self::Restricted,
            ChatMemberStatus::Left => Self::Left,
            ChatMemberStatus::Banned => Self::Banned,
        }
    }
}

/// Why membership could not be determined.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("user not found")]
    UserNotFound,
    #[error("channel not found or bot has no access to it")]
    ChatNotFound,
    #[error("rate limited by Telegram")]
    RateLimited,
    #[error("network error: {0}")]
    Network(String),
    #[error("Telegram API error: {0}")]
    Platform(String),
}

impl From<RequestError> for OracleError {
    fn from(error: RequestError) -> Self {
        match error {
            RequestError::Api(ApiError::UserNotFound) => Self::UserNotFound,
            RequestError::Api(ApiError::ChatNotFound) => Self::ChatNotFound,
            RequestError::RetryAfter(_) => Self::RateLimited,
            RequestError::Network(e) => Self::Network(e.to_string()),
            other => Self::Platform(other.to_string()),
        }
    }
}

#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn check_membership(
        &self,
        channel: &str,
        user_id: i64,
    ) -> Result<MembershipStatus, OracleError>;
}

pub struct TelegramOracle {
    bot: Bot,
}

impl TelegramOracle {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MembershipOracle for TelegramOracle {
    async fn check_membership(
        &self,
        channel: &str,
        user_id: i64,
    ) -> Result<MembershipStatus, OracleError> {
        let member = self
            .bot
            .get_chat_member(channel_recipient(channel), UserId(user_id as u64))
            .await
            .map_err(|error| {
                tracing::warn!(
                    user_id = user_id,
                    channel = channel,
                    error = %error,
                    "getChatMember failed"
                );
                OracleError::from(error)
            })?;
        let status = MembershipStatus::from(member.status());
        tracing::debug!(
            user_id = user_id,
            channel = channel,
            status = status.as_str(),
            "Membership status fetched"
        );
        Ok(status)
    }
}

/// `-100…` ids address the chat directly; anything else is a public username.
pub fn channel_recipient(channel: &str) -> Recipient {
    let channel = channel.trim();
    if let Ok(id) = channel.parse::<i64>() {
        return Recipient::Id(ChatId(id));
    }
    let name = channel.trim_start_matches('@');
    Recipient::ChannelUsername(format!("@{}", name))
}
