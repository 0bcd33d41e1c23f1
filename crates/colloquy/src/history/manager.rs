//! Read-only views over stored threads.

use super::store::HistoryStore;
use crate::error::HistoryError;
use crate::{Role, Turn};
use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct HistoryManager<S> {
    store: S,
}

impl<S: HistoryStore> HistoryManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Text of every user turn in `thread`, in order.
    pub fn parse_user_history(&self, thread: &str) -> Result<Vec<String>, HistoryError> {
        Ok(self
            .store
            .read_thread(thread)?
            .iter()
            .filter(|turn| turn.role() == Role::User)
            .filter_map(|turn| turn.text().map(str::to_string))
            .collect())
    }

    /// Render `thread` as markdown. Runs of consecutive user turns are
    /// merged into one block stamped with the first turn's time.
    pub fn print(&self, thread: &str) -> Result<String, HistoryError> {
        let turns = self.store.read_thread(thread)?;
        let mut out = String::new();
        let mut pending_user: Option<(String, Option<DateTime<Utc>>)> = None;

        for turn in &turns {
            let text = turn.text().unwrap_or_default();
            if turn.role() == Role::User {
                match pending_user.as_mut() {
                    Some((merged, _)) => merged.push_str(text),
                    None => pending_user = Some((text.to_string(), turn.timestamp)),
                }
                continue;
            }
            if let Some((merged, ts)) = pending_user.take() {
                out.push_str(&format_entry(Role::User, &merged, ts));
            }
            out.push_str(&format_entry(turn.role(), text, turn.timestamp));
        }
        if let Some((merged, ts)) = pending_user {
            out.push_str(&format_entry(Role::User, &merged, ts));
        }

        Ok(out)
    }
}

fn format_entry(role: Role, content: &str, timestamp: Option<DateTime<Utc>>) -> String {
    let (prefix, emoji) = match role {
        Role::System => ("\n", "💻"),
        Role::User => ("---\n", "👤"),
        Role::Function => ("---\n", "🔌"),
        Role::Assistant => ("\n", "🤖"),
    };
    let stamp = match (role, timestamp) {
        (Role::User, Some(ts)) => format!(" [{}]", ts.format(TIMESTAMP_FORMAT)),
        _ => String::new(),
    };
    let label = role.to_string().to_uppercase();
    format!("{prefix}**{label}** {emoji}{stamp}:\n{content}\n")
}
