//! Bot keyboards: inline join button and persistent reply menus.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};
use url::Url;

pub const BTN_USER_HELP: &str = "ℹ️ Help";

pub const BTN_ADMIN_STATS: &str = "📊 Stats";
pub const BTN_ADMIN_BROADCAST: &str = "📣 Broadcast";
pub const BTN_ADMIN_HELP: &str = "ℹ️ Admin help";

pub fn user_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(BTN_USER_HELP)]])
        .resize_keyboard()
        .persistent()
}

pub fn admin_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(BTN_ADMIN_STATS),
            KeyboardButton::new(BTN_ADMIN_BROADCAST),
        ],
        vec![KeyboardButton::new(BTN_ADMIN_HELP)],
    ])
    .resize_keyboard()
    .persistent()
}

/// Single URL button leading to the required channel. `None` if `join_url`
/// is not a valid URL.
pub fn join_channel_button(join_url: &str) -> Option<InlineKeyboardMarkup> {
    let url = match Url::parse(join_url) {
        Ok(url) => url,
        Err(error) => {
            tracing::warn!(join_url = join_url, error = %error, "Invalid channel join URL");
            return None;
        }
    };
    Some(InlineKeyboardMarkup::default().append_row(vec![InlineKeyboardButton::url(
        "📢 Join the channel",
        url,
    )]))
}
