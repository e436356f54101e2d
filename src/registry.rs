//! In-memory registry of app sessions and the membership reconciliation rules.
//!
//! An app session is keyed by the opaque `app_id` the external application
//! passes through the `/start join_<app_id>` deep link. Nothing here survives
//! a restart.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// How a session reached the verified state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum JoinSource {
    #[default]
    Unknown = 0,
    /// Already in the channel when the session was first checked.
    PreExistingMember = 1,
    /// Joined after the bot told them they were not a member.
    JoinedLater = 2,
}

/// Which admin notification a reconciliation calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PreExistingMember,
    JoinedLater,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub username: Option<String>,
    /// `None` until the first successful membership check.
    pub verified: Option<bool>,
    pub join_source: JoinSource,
    pub claimed_at: DateTime<Utc>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl Session {
    fn new(user_id: i64, username: Option<String>) -> Self {
        Self {
            user_id,
            username,
            verified: None,
            join_source: JoinSource::Unknown,
            claimed_at: Utc::now(),
            checked_at: None,
        }
    }
}

/// Result of one reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub verified: bool,
    pub join_source: JoinSource,
    pub notify: Option<NotificationKind>,
}

/// Pure transition function for a session's verification state.
pub fn decide(prev_verified: Option<bool>, prev_source: JoinSource, observed: bool) -> Decision {
    match (prev_verified, observed) {
        (None, true) => Decision {
            verified: true,
            join_source: JoinSource::PreExistingMember,
            notify: Some(NotificationKind::PreExistingMember),
        },
        (Some(false), true) => Decision {
            verified: true,
            join_source: JoinSource::JoinedLater,
            notify: Some(NotificationKind::JoinedLater),
        },
        (Some(true), true) => Decision {
            verified: true,
            join_source: prev_source,
            notify: None,
        },
        // The provenance tag of a past join is kept; `Unknown` is only the
        // default for a tag that was never set.
        (_, false) => Decision {
            verified: false,
            join_source: prev_source,
            notify: None,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub app_id: String,
    pub user_id: i64,
    pub username: Option<String>,
    pub verified: bool,
    pub join_source: JoinSource,
    pub notify: Option<NotificationKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub sessions: usize,
    pub unique_users: usize,
    pub verified: usize,
    pub unverified: usize,
    pub unknown: usize,
    pub pre_existing: usize,
    pub joined_later: usize,
    pub last_claim: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
}

/// Shared handle to the session map. Clones point at the same sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, app_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(app_id).cloned()
    }

    #[cfg(test)]
    pub async fn contains(&self, app_id: &str) -> bool {
        self.sessions.lock().await.contains_key(app_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Binds `app_id` to `user_id`, creating the session if needed.
    ///
    /// A later claim by a different user overwrites the previous one.
    /// Returns the previous claimant when it differed.
    pub async fn claim(&self, app_id: &str, user_id: i64, username: Option<&str>) -> Option<i64> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(app_id) {
            Some(session) => {
                let previous = session.user_id;
                session.user_id = user_id;
                session.username = username.map(str::to_string);
                (previous != user_id).then_some(previous)
            }
            None => {
                sessions.insert(
                    app_id.to_string(),
                    Session::new(user_id, username.map(str::to_string)),
                );
                None
            }
        }
    }

    /// Applies a freshly observed membership result to `app_id`.
    ///
    /// Read, decision and write happen under one lock acquisition.
    pub async fn reconcile(
        &self,
        app_id: &str,
        user_id: i64,
        username: Option<&str>,
        observed_is_member: bool,
    ) -> Reconciliation {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(app_id.to_string())
            .or_insert_with(|| Session::new(user_id, username.map(str::to_string)));

        session.user_id = user_id;
        if username.is_some() {
            session.username = username.map(str::to_string);
        }

        apply_observation(app_id, session, observed_is_member)
    }

    /// Like [`reconcile`](Self::reconcile), but only while `user_id` is
    /// still the claimant of an existing session. `None` means the session
    /// was re-claimed (or never existed) and nothing was written.
    pub async fn reconcile_claimant(
        &self,
        app_id: &str,
        user_id: i64,
        observed_is_member: bool,
    ) -> Option<Reconciliation> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(app_id)?;
        if session.user_id != user_id {
            return None;
        }
        Some(apply_observation(app_id, session, observed_is_member))
    }

    #[cfg(test)]
    pub async fn snapshot(&self) -> Vec<(String, Session)> {
        let sessions = self.sessions.lock().await;
        let mut all: Vec<(String, Session)> = sessions
            .iter()
            .map(|(app_id, session)| (app_id.clone(), session.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Every user id that ever claimed a session, de-duplicated and sorted.
    pub async fn distinct_user_ids(&self) -> Vec<i64> {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .map(|session| session.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub async fn stats(&self) -> RegistryStats {
        let sessions = self.sessions.lock().await;
        let mut stats = RegistryStats {
            sessions: sessions.len(),
            ..RegistryStats::default()
        };
        let mut users = BTreeSet::new();
        for session in sessions.values() {
            users.insert(session.user_id);
            stats.last_claim = stats.last_claim.max(Some(session.claimed_at));
            stats.last_check = stats.last_check.max(session.checked_at);
            match session.verified {
                Some(true) => stats.verified += 1,
                Some(false) => stats.unverified += 1,
                None => stats.unknown += 1,
            }
            match session.join_source {
                JoinSource::PreExistingMember => stats.pre_existing += 1,
                JoinSource::JoinedLater => stats.joined_later += 1,
                JoinSource::Unknown => {}
            }
        }
        stats.unique_users = users.len();
        stats
    }
}

fn apply_observation(app_id: &str, session: &mut Session, observed_is_member: bool) -> Reconciliation {
    let decision = decide(session.verified, session.join_source, observed_is_member);
    session.verified = Some(decision.verified);
    session.join_source = decision.join_source;
    session.checked_at = Some(Utc::now());

    Reconciliation {
        app_id: app_id.to_string(),
        user_id: session.user_id,
        username: session.username.clone(),
        verified: decision.verified,
        join_source: decision.join_source,
        notify: decision.notify,
    }
}
