//! Deep-link claim and polling flows on top of the session registry.

use crate::membership::{MembershipOracle, OracleError};
use crate::notify::{MessageSender, notify_admins};
use crate::registry::{NotificationKind, Reconciliation, SessionRegistry};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Verified(Reconciliation),
    NotMember(Reconciliation),
    /// Membership could not be checked; the session is claimed but its
    /// verification state is untouched.
    Unavailable(OracleError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nobody ever opened the deep link for this `app_id`.
    Unclaimed,
    Checked(Reconciliation),
    /// Another user claimed the `app_id` while the check was in flight.
    Superseded,
    Unavailable(OracleError),
}

impl PollOutcome {
    pub fn verified(&self) -> bool {
        matches!(self, PollOutcome::Checked(rec) if rec.verified)
    }
}

pub struct VerificationService {
    registry: SessionRegistry,
    oracle: Arc<dyn MembershipOracle>,
    sender: Arc<dyn MessageSender>,
    channel: String,
    admin_ids: Vec<i64>,
}

impl VerificationService {
    pub fn new(
        registry: SessionRegistry,
        oracle: Arc<dyn MembershipOracle>,
        sender: Arc<dyn MessageSender>,
        channel: impl Into<String>,
        admin_ids: impl IntoIterator<Item = i64>,
    ) -> Self {
        let mut admin_ids: Vec<i64> = admin_ids.into_iter().collect();
        admin_ids.sort_unstable();
        Self {
            registry,
            oracle,
            sender,
            channel: channel.into(),
            admin_ids,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn sender(&self) -> &dyn MessageSender {
        self.sender.as_ref()
    }

    /// `/start join_<app_id>`: bind the session to the caller and check them.
    pub async fn claim_and_verify(
        &self,
        app_id: &str,
        user_id: i64,
        username: Option<&str>,
    ) -> StartOutcome {
        if let Some(previous) = self.registry.claim(app_id, user_id, username).await {
            tracing::warn!(
                app_id = %app_id,
                previous_user_id = previous,
                user_id = user_id,
                "app_id claimed by a different user, overwriting"
            );
        }

        let status = match self.oracle.check_membership(&self.channel, user_id).await {
            Ok(status) => status,
            Err(error) => {
                tracing::error!(
                    app_id = %app_id,
                    user_id = user_id,
                    error = %error,
                    "Membership check failed during /start"
                );
                return StartOutcome::Unavailable(error);
            }
        };
        tracing::info!(
            app_id = %app_id,
            user_id = user_id,
            status = status.as_str(),
            "Membership checked on /start"
        );

        let rec = self
            .registry
            .reconcile(app_id, user_id, username, status.is_member())
            .await;
        self.notify_if_needed(&rec).await;
        if rec.verified {
            StartOutcome::Verified(rec)
        } else {
            StartOutcome::NotMember(rec)
        }
    }

    /// `check_join`: live re-check of whoever last claimed `app_id`.
    pub async fn poll(&self, app_id: &str) -> PollOutcome {
        let Some(session) = self.registry.get(app_id).await else {
            return PollOutcome::Unclaimed;
        };

        let status = match self
            .oracle
            .check_membership(&self.channel, session.user_id)
            .await
        {
            Ok(status) => status,
            Err(error) => {
                tracing::error!(
                    app_id = %app_id,
                    user_id = session.user_id,
                    error = %error,
                    "Membership check failed during check_join"
                );
                return PollOutcome::Unavailable(error);
            }
        };

        // A /start that re-claimed the session during the check wins; this
        // result belongs to the previous claimant and is dropped.
        let Some(rec) = self
            .registry
            .reconcile_claimant(app_id, session.user_id, status.is_member())
            .await
        else {
            tracing::info!(
                app_id = %app_id,
                user_id = session.user_id,
                "app_id re-claimed during check_join, discarding result"
            );
            return PollOutcome::Superseded;
        };
        tracing::info!(
            app_id = %app_id,
            user_id = rec.user_id,
            status = status.as_str(),
            verified = rec.verified,
            "Live check for check_join"
        );
        self.notify_if_needed(&rec).await;
        PollOutcome::Checked(rec)
    }

    async fn notify_if_needed(&self, rec: &Reconciliation) {
        let Some(kind) = rec.notify else {
            return;
        };
        let text = notification_text(kind, rec);
        let report = notify_admins(self.sender.as_ref(), self.admin_ids.iter().copied(), &text).await;
        tracing::info!(
            app_id = %rec.app_id,
            user_id = rec.user_id,
            kind = ?kind,
            delivered = report.delivered,
            failed = report.failed.len(),
            "Admin notification sent"
        );
    }
}

pub fn notification_text(kind: NotificationKind, rec: &Reconciliation) -> String {
    let headline = match kind {
        NotificationKind::PreExistingMember => "✅ Pre-existing member verified",
        NotificationKind::JoinedLater => "🎉 New member joined after bot interaction",
    };
    let username = rec
        .username
        .as_deref()
        .map(|name| format!("@{}", name))
        .unwrap_or_else(|| "—".to_string());
    format!(
        "{}\n\
         User ID: {}\n\
         Username: {}\n\
         App ID: {}",
        headline, rec.user_id, username, rec.app_id
    )
}
