use super::HandlerError;
use super::format::{
    ADMIN_GREETING_TEXT, CHECK_FAILED_TEXT, GREETING_TEXT, admin_help_text, not_member_text,
    render_broadcast_report, user_help_text, verified_text,
};
use super::shared::{
    DirectSendOutcome, HandlerResult, StartPayload, admin_broadcast, admin_direct_send,
    admin_stats, broadcast_payload, parse_start_payload, user_id_or_reply,
};
use super::state::{BotState, is_admin_message, sender_user_id, sender_username};
use crate::verification::StartOutcome;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "Verify channel membership")]
    Start(String),
    #[command(description = "Help")]
    Help,
    #[command(description = "Show the menu")]
    Menu,
    #[command(description = "Statistics (admin)")]
    Stats,
    #[command(description = "Broadcast to all users (admin)")]
    SendAll(String),
    #[command(description = "Message one user (admin)")]
    Send(String),
}

pub fn handler() -> teloxide::dispatching::UpdateHandler<HandlerError> {
    teloxide::filter_command::<Command, _>()
        .branch(dptree::case![Command::Start(args)].endpoint(start_cmd))
        .branch(dptree::case![Command::Help].endpoint(cmd_help))
        .branch(dptree::case![Command::Menu].endpoint(cmd_menu))
        .branch(dptree::case![Command::Stats].endpoint(cmd_stats))
        .branch(dptree::case![Command::SendAll(args)].endpoint(cmd_sendall))
        .branch(dptree::case![Command::Send(args)].endpoint(cmd_send))
}

pub async fn cmd_help(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let (text, reply_markup) = if is_admin_message(&msg, &state) {
        (admin_help_text(), crate::bot::keyboards::admin_menu())
    } else {
        (user_help_text(), crate::bot::keyboards::user_menu())
    };
    bot.send_message(msg.chat.id, text)
        .reply_markup(reply_markup)
        .await?;
    Ok(())
}

async fn cmd_menu(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    if is_admin_message(&msg, &state) {
        bot.send_message(msg.chat.id, "Admin menu")
            .reply_markup(crate::bot::keyboards::admin_menu())
            .await?;
    } else {
        bot.send_message(msg.chat.id, "Menu")
            .reply_markup(crate::bot::keyboards::user_menu())
            .await?;
    }
    Ok(())
}

async fn start_cmd(bot: Bot, msg: Message, state: BotState, args: String) -> HandlerResult {
    let user_id = match user_id_or_reply(&msg) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(error = %error, "Received /start without sender");
            return Ok(());
        }
    };
    let username = sender_username(&msg);

    let app_id = match parse_start_payload(&args) {
        StartPayload::HasAppId(app_id) => app_id,
        StartPayload::NoDeepLink => {
            tracing::info!(user_id = user_id, username = ?username, "Received plain /start");
            if state.config.is_admin(user_id) {
                bot.send_message(msg.chat.id, ADMIN_GREETING_TEXT)
                    .reply_markup(crate::bot::keyboards::admin_menu())
                    .await?;
            } else {
                bot.send_message(msg.chat.id, GREETING_TEXT).await?;
            }
            return Ok(());
        }
    };
    tracing::info!(
        user_id = user_id,
        username = ?username,
        app_id = %app_id,
        "Received /start with deep link"
    );

    match state
        .verification
        .claim_and_verify(&app_id, user_id, username.as_deref())
        .await
    {
        StartOutcome::Verified(_) => {
            bot.send_message(msg.chat.id, verified_text()).await?;
        }
        StartOutcome::NotMember(_) => {
            let text = not_member_text(&state.config.required_channel);
            let button = state
                .config
                .join_url()
                .and_then(|url| crate::bot::keyboards::join_channel_button(&url));
            match button {
                Some(keyboard) => {
                    bot.send_message(msg.chat.id, text)
                        .reply_markup(keyboard)
                        .await?;
                }
                None => {
                    bot.send_message(msg.chat.id, text).await?;
                }
            }
        }
        StartOutcome::Unavailable(_) => {
            bot.send_message(msg.chat.id, CHECK_FAILED_TEXT).await?;
        }
    }
    Ok(())
}

pub async fn cmd_stats(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    let Some(text) = admin_stats(&state, user_id).await else {
        return Ok(());
    };
    tracing::info!(admin_id = user_id, "Admin command /stats");
    bot.send_message(msg.chat.id, text)
        .reply_markup(crate::bot::keyboards::admin_menu())
        .await?;
    Ok(())
}

async fn cmd_sendall(bot: Bot, msg: Message, state: BotState, args: String) -> HandlerResult {
    if !is_admin_message(&msg, &state) {
        return Ok(());
    }
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    let Some(payload) = broadcast_payload(&msg, &args) else {
        bot.send_message(
            msg.chat.id,
            "Usage: /sendall <text>, or reply to a message with /sendall",
        )
        .await?;
        return Ok(());
    };

    let recipients = state.verification.registry().distinct_user_ids().await.len();
    bot.send_message(
        msg.chat.id,
        format!("Broadcast started for {} users…", recipients),
    )
    .await?;

    // The broadcast sleeps between sends; run it off the update path so the
    // webhook is acknowledged right away.
    let chat_id = msg.chat.id;
    tokio::spawn(async move {
        let Some(report) = admin_broadcast(&state, user_id, &payload).await else {
            return;
        };
        if let Err(error) = bot
            .send_message(chat_id, render_broadcast_report(&report))
            .await
        {
            tracing::warn!(
                admin_id = user_id,
                error = %error,
                "Failed to deliver broadcast report"
            );
        }
    });
    Ok(())
}

async fn cmd_send(bot: Bot, msg: Message, state: BotState, args: String) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    let Some(outcome) = admin_direct_send(&state, user_id, &args).await else {
        return Ok(());
    };
    let reply = match outcome {
        DirectSendOutcome::Usage => "Usage: /send <user_id> <text>".to_string(),
        DirectSendOutcome::Sent(target) => format!("✅ Sent to {}", target),
        DirectSendOutcome::Failed(target, error) => {
            format!("❌ Could not send to {}: {}", target, error)
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}
