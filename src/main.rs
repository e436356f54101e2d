//! join-gate: Telegram bot that verifies channel membership for an external app.

mod api;
mod bot;
mod config;
mod membership;
mod notify;
mod registry;
#[cfg(test)]
mod testkit;
mod verification;

use anyhow::Context;
use std::sync::Arc;
use teloxide::dispatching::Dispatcher;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::config::UpdateMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Arc::new(config::Config::from_env().context("Invalid configuration")?);
    tracing::info!(
        admin_count = config.admin_ids.len(),
        channel = %config.required_channel,
        listen_addr = %config.listen_addr,
        update_mode = config.update_mode.as_str(),
        broadcast_delay_ms = config.broadcast_delay.as_millis() as u64,
        "Configuration loaded"
    );

    let bot = Bot::new(&config.bot_token);
    let verification = Arc::new(verification::VerificationService::new(
        registry::SessionRegistry::new(),
        Arc::new(membership::TelegramOracle::new(bot.clone())),
        Arc::new(bot.clone()),
        config.required_channel.clone(),
        config.admin_ids.iter().copied(),
    ));

    let me = match bot.get_me().await {
        Ok(me) => Some(me),
        Err(error) => {
            tracing::warn!(error = %error, "Failed to fetch bot identity via getMe");
            None
        }
    };

    let state = bot::handlers::BotState {
        config: config.clone(),
        verification: verification.clone(),
        bot_username: me.as_ref().and_then(|me| me.user.username.clone()),
    };

    if let Err(error) = bot
        .set_my_commands(bot::handlers::Command::bot_commands())
        .await
    {
        tracing::warn!(error = %error, "Failed to register bot commands");
    }

    let updates: Option<Arc<dyn api::UpdateSink>> = match (config.update_mode, me) {
        (UpdateMode::Webhook, Some(me)) => Some(Arc::new(bot::updates::HandlerSink::new(
            bot.clone(),
            me,
            state.clone(),
        ))),
        _ => None,
    };

    if config.update_mode == UpdateMode::Webhook {
        register_webhook(&bot, &config).await;
    }

    let api_state = api::ApiState {
        secret: Arc::from(config.api_secret.as_str()),
        mode: config.update_mode,
        verification,
        updates,
    };
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "HTTP server listening");
    let server = axum::serve(listener, api::router(api_state)).with_graceful_shutdown(async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "Failed to listen for Ctrl-C");
        }
    });

    match config.update_mode {
        UpdateMode::Webhook => {
            tracing::info!(bot_username = ?state.bot_username, "Bot is ready (webhook mode)");
            server.await.context("HTTP server error")?;
        }
        UpdateMode::Polling => {
            let server_task = tokio::spawn(async move { server.await });
            tracing::info!(bot_username = ?state.bot_username, "Bot is ready (polling mode)");

            Dispatcher::builder(bot, bot::handlers::schema())
                .dependencies(dptree::deps![state])
                .enable_ctrlc_handler()
                .build()
                .dispatch()
                .await;

            server_task
                .await
                .context("HTTP server task panicked")?
                .context("HTTP server error")?;
        }
    }

    tracing::info!("Shut down");
    Ok(())
}

async fn register_webhook(bot: &Bot, config: &config::Config) {
    let Some(url) = config.webhook_url.clone() else {
        tracing::info!("WEBHOOK_URL not set, assuming the webhook is registered externally");
        return;
    };
    match bot
        .set_webhook(url.clone())
        .secret_token(config.api_secret.clone())
        .await
    {
        Ok(_) => tracing::info!(url = %url, "Webhook registered"),
        Err(error) => tracing::error!(url = %url, error = %error, "Failed to register webhook"),
    }
}
