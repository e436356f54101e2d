//! Test doubles for the Telegram-facing traits.

use crate::membership::{MembershipOracle, MembershipStatus, OracleError};
use crate::notify::{MessageSender, SendError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Oracle with scripted per-user answers. Unscripted users have `Left`.
#[derive(Default)]
pub struct StubOracle {
    answers: Mutex<HashMap<i64, Result<MembershipStatus, OracleError>>>,
    calls: AtomicUsize,
}

impl StubOracle {
    pub fn set(&self, user_id: i64, answer: Result<MembershipStatus, OracleError>) {
        self.answers.lock().unwrap().insert(user_id, answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipOracle for StubOracle {
    async fn check_membership(
        &self,
        _channel: &str,
        user_id: i64,
    ) -> Result<MembershipStatus, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or(Ok(MembershipStatus::Left))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
    },
    Copy {
        chat_id: i64,
        from_chat_id: i64,
        message_id: i32,
    },
}

impl Sent {
    pub fn chat_id(&self) -> i64 {
        match self {
            Sent::Text { chat_id, .. } | Sent::Copy { chat_id, .. } => *chat_id,
        }
    }
}

/// Records successful deliveries; recipients in `failing` always fail.
#[derive(Default)]
pub struct RecordingSender {
    failing: HashSet<i64>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingSender {
    pub fn failing_for(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            failing: ids.into_iter().collect(),
            sent: Mutex::default(),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { chat_id: id, text } if id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        if self.failing.contains(&chat_id) {
            return Err(SendError::Blocked);
        }
        self.sent.lock().unwrap().push(Sent::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn copy_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i32,
    ) -> Result<(), SendError> {
        if self.failing.contains(&chat_id) {
            return Err(SendError::Blocked);
        }
        self.sent.lock().unwrap().push(Sent::Copy {
            chat_id,
            from_chat_id,
            message_id,
        });
        Ok(())
    }
}
