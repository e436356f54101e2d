//! Telegram side of the bot: command routing, keyboards, webhook dispatch.

pub mod handlers;
pub mod keyboards;
pub mod updates;
