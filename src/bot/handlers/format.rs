use crate::notify::BroadcastReport;
use crate::registry::RegistryStats;
use chrono::{DateTime, Utc};

pub const GREETING_TEXT: &str = "Hi! To verify your channel membership, open this bot \
                                 through the link inside the app.";

pub const ADMIN_GREETING_TEXT: &str = "🚀 Welcome, admin. The bot is up and running. \
                                       Use the menu below.";

pub const CHECK_FAILED_TEXT: &str = "Something went wrong while checking your membership. \
                                     Please try again from the app in a moment.";

pub fn verified_text() -> &'static str {
    "Your channel membership is confirmed ✅\n\
     Go back to the app and tap «Check membership»."
}

pub fn not_member_text(channel: &str) -> String {
    format!(
        "You are not a member of {} yet.\n\
         Join using the button below, then go back to the app and open the bot link again.",
        channel
    )
}

pub fn user_help_text() -> &'static str {
    "This bot checks your membership in the required channel.\n\n\
     Open it through the link inside the app and your membership is verified \
     automatically. If you were not a member yet, join the channel and open the \
     link again."
}

pub fn admin_help_text() -> &'static str {
    r#"Admin commands:
/start — greeting
/menu — show the admin keyboard
/stats — session and verification statistics
/sendall <text> — broadcast to every known user
/sendall (as a reply) — broadcast a copy of the replied message
/send <user_id> <text> — message a single user"#
}

fn render_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

pub fn render_stats(stats: &RegistryStats, channel: &str) -> String {
    format!(
        "📊 Statistics\n\
         Channel: {}\n\
         Sessions: {}\n\
         Unique users: {}\n\
         Verified: {}\n\
         Not members: {}\n\
         Not checked: {}\n\
         Pre-existing members: {}\n\
         Joined after the bot: {}\n\
         Last claim: {}\n\
         Last check: {}",
        channel,
        stats.sessions,
        stats.unique_users,
        stats.verified,
        stats.unverified,
        stats.unknown,
        stats.pre_existing,
        stats.joined_later,
        render_time(stats.last_claim),
        render_time(stats.last_check),
    )
}

pub fn render_broadcast_report(report: &BroadcastReport) -> String {
    let mut out = format!(
        "📣 Broadcast finished\n\
         Recipients: {}\n\
         Sent: {}\n\
         Failed: {}",
        report.total(),
        report.sent,
        report.failed
    );
    if !report.errors.is_empty() {
        out.push_str("\n\nSample errors:");
        for error in &report.errors {
            out.push_str("\n• ");
            out.push_str(error);
        }
    }
    out
}
