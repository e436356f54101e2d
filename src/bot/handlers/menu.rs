use super::commands::{cmd_help, cmd_stats};
use super::shared::HandlerResult;
use super::state::{BotState, sender_user_id};
use teloxide::prelude::*;

pub async fn handle_menu_buttons(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    let is_admin = state.config.is_admin(user_id);

    match text {
        crate::bot::keyboards::BTN_USER_HELP | crate::bot::keyboards::BTN_ADMIN_HELP => {
            cmd_help(bot, msg, state).await?;
        }
        crate::bot::keyboards::BTN_ADMIN_STATS if is_admin => {
            cmd_stats(bot, msg, state).await?;
        }
        crate::bot::keyboards::BTN_ADMIN_BROADCAST if is_admin => {
            bot.send_message(
                msg.chat.id,
                "Broadcast:\n\
                 /sendall <text> — send a text to every known user\n\
                 Reply to any message with /sendall to forward a copy of it.",
            )
            .reply_markup(crate::bot::keyboards::admin_menu())
            .await?;
        }
        // Fallback hint is for private chats only.
        _ if !msg.chat.is_private() => {}
        _ => {
            let (reply_text, reply_markup) = if is_admin {
                (
                    "Unknown command. Use the admin menu below.",
                    crate::bot::keyboards::admin_menu(),
                )
            } else {
                (
                    "To verify your membership, open this bot through the link in the app.",
                    crate::bot::keyboards::user_menu(),
                )
            };
            bot.send_message(msg.chat.id, reply_text)
                .reply_markup(reply_markup)
                .await?;
        }
    }
    Ok(())
}
