use super::HandlerError;
use super::format::render_stats;
use super::state::{BotState, sender_user_id};
use crate::notify::{BroadcastPayload, BroadcastReport, SendError, broadcast};
use anyhow::anyhow;
use teloxide::types::Message;

pub type HandlerResult = Result<(), HandlerError>;

const DEEP_LINK_PREFIX: &str = "join_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPayload {
    NoDeepLink,
    HasAppId(String),
}

/// Parses the argument of `/start`. Only `join_<app_id>` payloads count.
pub fn parse_start_payload(args: &str) -> StartPayload {
    let raw = args.trim();
    if raw.is_empty() {
        return StartPayload::NoDeepLink;
    }

    let decoded = match urlencoding::decode(raw) {
        Ok(value) => value.into_owned(),
        Err(_) => raw.to_string(),
    };
    let normalized = decoded.trim();

    let has_prefix = normalized
        .get(..DEEP_LINK_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(DEEP_LINK_PREFIX));
    if !has_prefix {
        return StartPayload::NoDeepLink;
    }

    let app_id = normalized[DEEP_LINK_PREFIX.len()..].trim();
    if app_id.is_empty() {
        StartPayload::NoDeepLink
    } else {
        StartPayload::HasAppId(app_id.to_string())
    }
}

/// `<user_id> <text…>` for `/send`.
pub fn parse_send_args(args: &str) -> Option<(i64, String)> {
    let args = args.trim();
    let (target, text) = args.split_once(char::is_whitespace)?;
    let target_id = target.parse::<i64>().ok()?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((target_id, text.to_string()))
}

/// What `/sendall` should deliver: its own text, or else the message it replies to.
pub fn broadcast_payload(msg: &Message, args: &str) -> Option<BroadcastPayload> {
    let text = args.trim();
    if !text.is_empty() {
        return Some(BroadcastPayload::Text(text.to_string()));
    }
    msg.reply_to_message().map(|replied| BroadcastPayload::Copy {
        from_chat_id: msg.chat.id.0,
        message_id: replied.id.0,
    })
}

pub fn user_id_or_reply(msg: &Message) -> Result<i64, anyhow::Error> {
    sender_user_id(msg).ok_or_else(|| anyhow!("Could not determine the sender of the message"))
}

/// Statistics text for an admin, `None` for anyone else.
pub async fn admin_stats(state: &BotState, user_id: i64) -> Option<String> {
    if !state.config.is_admin(user_id) {
        return None;
    }
    let stats = state.verification.registry().stats().await;
    Some(render_stats(&stats, state.verification.channel()))
}

/// Sends `payload` to every distinct user known to the registry.
/// `None` (and nothing sent) for non-admins.
pub async fn admin_broadcast(
    state: &BotState,
    user_id: i64,
    payload: &BroadcastPayload,
) -> Option<BroadcastReport> {
    if !state.config.is_admin(user_id) {
        return None;
    }
    let recipients = state.verification.registry().distinct_user_ids().await;
    tracing::info!(
        admin_id = user_id,
        recipients = recipients.len(),
        "Starting broadcast"
    );
    Some(
        broadcast(
            state.verification.sender(),
            &recipients,
            payload,
            state.config.broadcast_delay,
        )
        .await,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectSendOutcome {
    Usage,
    Sent(i64),
    Failed(i64, SendError),
}

pub async fn admin_direct_send(
    state: &BotState,
    user_id: i64,
    args: &str,
) -> Option<DirectSendOutcome> {
    if !state.config.is_admin(user_id) {
        return None;
    }
    let Some((target, text)) = parse_send_args(args) else {
        return Some(DirectSendOutcome::Usage);
    };
    tracing::info!(admin_id = user_id, target_id = target, "Admin direct send");
    let outcome = match state.verification.sender().send_text(target, &text).await {
        Ok(()) => DirectSendOutcome::Sent(target),
        Err(error) => {
            tracing::warn!(target_id = target, error = %error, "Direct send failed");
            DirectSendOutcome::Failed(target, error)
        }
    };
    Some(outcome)
}
