//! Outbound delivery: admin notifications and broadcasts.

use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use teloxide::{ApiError, RequestError};
use thiserror::Error;

/// Upper bound on per-recipient error strings kept in a broadcast report.
pub const MAX_ERROR_SAMPLES: usize = 10;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("bot was blocked by the user")]
    Blocked,
    #[error("chat not found")]
    ChatNotFound,
    #[error("rate limited by Telegram")]
    RateLimited,
    #[error("{0}")]
    Other(String),
}

impl From<RequestError> for SendError {
    fn from(error: RequestError) -> Self {
        match error {
            RequestError::Api(ApiError::BotBlocked) => Self::Blocked,
            RequestError::Api(ApiError::ChatNotFound) => Self::ChatNotFound,
            RequestError::RetryAfter(_) => Self::RateLimited,
            other => Self::Other(other.to_string()),
        }
    }
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError>;

    async fn copy_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i32,
    ) -> Result<(), SendError>;
}

#[async_trait]
impl MessageSender for Bot {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        self.send_message(ChatId(chat_id), text.to_string()).await?;
        Ok(())
    }

    async fn copy_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i32,
    ) -> Result<(), SendError> {
        Requester::copy_message(
            self,
            ChatId(chat_id),
            ChatId(from_chat_id),
            MessageId(message_id),
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: Vec<(i64, String)>,
}

/// Sends `text` to every admin. Failures are logged and collected, never
/// returned as an error.
pub async fn notify_admins<I>(sender: &dyn MessageSender, admins: I, text: &str) -> FanoutReport
where
    I: IntoIterator<Item = i64>,
{
    let mut report = FanoutReport::default();
    for admin_id in admins {
        match sender.send_text(admin_id, text).await {
            Ok(()) => report.delivered += 1,
            Err(error) => {
                tracing::warn!(
                    admin_id = admin_id,
                    error = %error,
                    "Failed to deliver admin notification"
                );
                report.failed.push((admin_id, error.to_string()));
            }
        }
    }
    report
}

/// What a broadcast delivers to each recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastPayload {
    Text(String),
    /// Re-send an existing message (the one `/sendall` replied to).
    Copy { from_chat_id: i64, message_id: i32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
    /// `"<user_id>: <error>"`, at most [`MAX_ERROR_SAMPLES`] entries.
    pub errors: Vec<String>,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }
}

/// Delivers `payload` to each recipient in order, pausing `delay` between
/// sends to stay under the platform flood limits.
pub async fn broadcast(
    sender: &dyn MessageSender,
    recipients: &[i64],
    payload: &BroadcastPayload,
    delay: Duration,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for (index, &user_id) in recipients.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = match payload {
            BroadcastPayload::Text(text) => sender.send_text(user_id, text).await,
            BroadcastPayload::Copy {
                from_chat_id,
                message_id,
            } => {
                sender
                    .copy_message(user_id, *from_chat_id, *message_id)
                    .await
            }
        };
        match result {
            Ok(()) => report.sent += 1,
            Err(error) => {
                tracing::debug!(user_id = user_id, error = %error, "Broadcast delivery failed");
                report.failed += 1;
                if report.errors.len() < MAX_ERROR_SAMPLES {
                    report.errors.push(format!("{}: {}", user_id, error));
                }
            }
        }
    }
    tracing::info!(
        recipients = recipients.len(),
        sent = report.sent,
        failed = report.failed,
        "Broadcast finished"
    );
    report
}
