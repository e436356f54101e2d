//! Runs webhook updates through the same handler tree the polling
//! dispatcher uses.

use super::handlers::{BotState, HandlerError, schema};
use crate::api::UpdateSink;
use async_trait::async_trait;
use std::ops::ControlFlow;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::Me;

pub struct HandlerSink {
    bot: Bot,
    me: Me,
    state: BotState,
    handler: UpdateHandler<HandlerError>,
}

impl HandlerSink {
    pub fn new(bot: Bot, me: Me, state: BotState) -> Self {
        Self {
            bot,
            me,
            state,
            handler: schema(),
        }
    }
}

#[async_trait]
impl UpdateSink for HandlerSink {
    async fn dispatch(&self, update: Update) -> anyhow::Result<()> {
        let update_id = update.id.0;
        let deps = dptree::deps![
            self.bot.clone(),
            self.me.clone(),
            self.state.clone(),
            update
        ];
        match self.handler.dispatch(deps).await {
            ControlFlow::Break(Ok(())) => Ok(()),
            ControlFlow::Break(Err(error)) => Err(anyhow::anyhow!(error)),
            ControlFlow::Continue(_) => {
                tracing::debug!(update_id = update_id, "Update not handled");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::membership::{MembershipStatus, OracleError};
    use crate::registry::SessionRegistry;
    use crate::testkit::{RecordingSender, StubOracle};
    use crate::verification::VerificationService;
    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    const USER: i64 = 42;
    const ADMIN: i64 = 900;
    const GROUP: i64 = -100500;

    /// Records Bot API calls and answers them like Telegram would.
    #[derive(Clone, Default)]
    struct FakeBotApi {
        calls: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl FakeBotApi {
        fn sent_messages(&self) -> Vec<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(method, _)| method.eq_ignore_ascii_case("sendMessage"))
                .map(|(_, params)| params.clone())
                .collect()
        }
    }

    async fn fake_method(
        State(api): State<FakeBotApi>,
        Path((_token, method)): Path<(String, String)>,
        body: Bytes,
    ) -> Json<Value> {
        let params: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let chat_id = params["chat_id"].clone();
        api.calls.lock().unwrap().push((method.clone(), params));
        if method.eq_ignore_ascii_case("sendMessage") {
            Json(json!({
                "ok": true,
                "result": {
                    "message_id": 1000,
                    "date": 1_700_000_000,
                    "chat": { "id": chat_id, "type": "private", "first_name": "Alice" },
                    "from": { "id": 1, "is_bot": true, "first_name": "Gate", "username": "gate_bot" },
                    "text": "ok"
                }
            }))
        } else {
            Json(json!({ "ok": true, "result": true }))
        }
    }

    struct Harness {
        api: FakeBotApi,
        oracle: Arc<StubOracle>,
        admin_inbox: Arc<RecordingSender>,
        registry: SessionRegistry,
        sink: HandlerSink,
    }

    async fn harness() -> Harness {
        let api = FakeBotApi::default();
        let app = Router::new()
            .route("/{token}/{method}", post(fake_method))
            .with_state(api.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let bot = Bot::new("123:abc")
            .set_api_url(url::Url::parse(&format!("http://{addr}")).unwrap());
        let me: Me = serde_json::from_value(json!({
            "id": 1,
            "is_bot": true,
            "first_name": "Gate",
            "username": "gate_bot",
            "can_join_groups": true,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "has_main_web_app": false
        }))
        .unwrap();

        let config = Config::from_lookup(|name| match name {
            "BOT_TOKEN" => Some("123:abc".to_string()),
            "API_SECRET" => Some("s3cret".to_string()),
            "REQUIRED_CHANNEL" => Some("@NuLimit".to_string()),
            "ADMIN_IDS" => Some(ADMIN.to_string()),
            _ => None,
        })
        .unwrap();
        let oracle = Arc::new(StubOracle::default());
        let admin_inbox = Arc::new(RecordingSender::default());
        let registry = SessionRegistry::new();
        let verification = Arc::new(VerificationService::new(
            registry.clone(),
            oracle.clone(),
            admin_inbox.clone(),
            config.required_channel.clone(),
            config.admin_ids.iter().copied(),
        ));
        let state = BotState {
            config: Arc::new(config),
            verification,
            bot_username: Some("gate_bot".to_string()),
        };

        Harness {
            api,
            oracle,
            admin_inbox,
            registry,
            sink: HandlerSink::new(bot, me, state),
        }
    }

    fn private_text(update_id: i32, text: &str) -> Update {
        serde_json::from_str(&json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "date": 1_700_000_000,
                "chat": { "id": USER, "type": "private", "first_name": "Alice" },
                "from": { "id": USER, "is_bot": false, "first_name": "Alice", "username": "alice" },
                "text": text
            }
        }).to_string())
        .unwrap()
    }

    fn group_text(update_id: i32, text: &str) -> Update {
        serde_json::from_str(&json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "date": 1_700_000_000,
                "chat": { "id": GROUP, "type": "group", "title": "Lobby" },
                "from": { "id": USER, "is_bot": false, "first_name": "Alice", "username": "alice" },
                "text": text
            }
        }).to_string())
        .unwrap()
    }

    #[tokio::test]
    async fn plain_start_greets_without_touching_sessions() {
        let h = harness().await;
        h.sink.dispatch(private_text(1, "/start")).await.unwrap();

        assert_eq!(h.registry.len().await, 0);
        assert_eq!(h.oracle.calls(), 0);
        let sent = h.api.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["chat_id"], USER);
        assert!(sent[0]["text"].as_str().unwrap().contains("open this bot"));
    }

    #[tokio::test]
    async fn deep_link_start_for_member_verifies_and_alerts_admins() {
        let h = harness().await;
        h.oracle.set(USER, Ok(MembershipStatus::Member));
        h.sink
            .dispatch(private_text(2, "/start join_app-7"))
            .await
            .unwrap();

        let session = h.registry.get("app-7").await.unwrap();
        assert_eq!(session.user_id, USER);
        assert_eq!(session.username.as_deref(), Some("alice"));
        assert_eq!(session.verified, Some(true));

        let sent = h.api.sent_messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0]["text"].as_str().unwrap().contains("confirmed"));
        assert_eq!(h.admin_inbox.texts_to(ADMIN).len(), 1);
    }

    #[tokio::test]
    async fn deep_link_start_for_outsider_offers_join_button() {
        let h = harness().await;
        h.oracle.set(USER, Ok(MembershipStatus::Left));
        h.sink
            .dispatch(private_text(3, "/start join_app-7"))
            .await
            .unwrap();

        let session = h.registry.get("app-7").await.unwrap();
        assert_eq!(session.verified, Some(false));

        let sent = h.api.sent_messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0]["text"].as_str().unwrap().contains("not a member of @NuLimit"));
        assert_eq!(
            sent[0]["reply_markup"]["inline_keyboard"][0][0]["url"],
            "https://t.me/NuLimit"
        );
        assert!(h.admin_inbox.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_check_keeps_claim_unverified() {
        let h = harness().await;
        h.oracle
            .set(USER, Err(OracleError::Network("timed out".to_string())));
        h.sink
            .dispatch(private_text(4, "/start join_app-7"))
            .await
            .unwrap();

        let session = h.registry.get("app-7").await.unwrap();
        assert_eq!(session.user_id, USER);
        assert_eq!(session.verified, None);

        let sent = h.api.sent_messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0]["text"].as_str().unwrap().contains("try again"));
    }

    #[tokio::test]
    async fn group_chatter_gets_no_reply() {
        let h = harness().await;
        h.sink.dispatch(group_text(5, "hello everyone")).await.unwrap();
        h.sink.dispatch(group_text(6, "/stats@OtherBot")).await.unwrap();
        assert!(h.api.sent_messages().is_empty());

        h.sink.dispatch(private_text(7, "hello")).await.unwrap();
        let sent = h.api.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["chat_id"], USER);
    }
}
