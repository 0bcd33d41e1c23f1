//! The token-budgeted conversation window.
//!
//! Turn 0 is the anchor: a system turn holding the persona. It is written
//! on initialization, overwritten with the configured persona every time,
//! and never evicted. Every other turn is append-only until truncation
//! drops the oldest ones.
//!
//! Truncation runs after each append. When the estimated total exceeds the
//! effective window, turns are evicted from index 1 onward until the
//! evicted cost first exceeds the overflow. When even evicting every
//! non-anchor turn would not exceed it, only turn 1 is dropped and the
//! budget is not re-checked.

use super::budget::{ContextUsage, effective_context_window, turn_costs};
use crate::{Message, Turn};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Outcome of a truncation pass that evicted turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationReport {
    /// Number of turns removed.
    pub evicted: usize,
    /// Turns left, anchor included.
    pub remaining: usize,
    /// Estimated total before eviction.
    pub estimated_tokens: usize,
    /// Effective budget the total was checked against.
    pub budget: usize,
    /// The scan never exceeded the overflow; only turn 1 was dropped.
    pub degenerate: bool,
}

/// Ordered turns for one conversation.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    turns: Vec<Turn>,
    context_window: usize,
}

impl ConversationWindow {
    /// An empty, uninitialized window.
    pub fn new(context_window: usize) -> Self {
        Self {
            turns: Vec::new(),
            context_window,
        }
    }

    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    pub fn is_initialized(&self) -> bool {
        !self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Replace the window with `persisted` turns, or a fresh anchor when
    /// there are none, then write `anchor_text` into the anchor.
    pub fn initialize(&mut self, persisted: Vec<Turn>, anchor_text: &str, now: DateTime<Utc>) {
        self.turns = persisted;
        self.materialize_anchor(anchor_text, now);
    }

    /// Initialize from `load` only if the window is still empty. The anchor
    /// text is refreshed either way.
    pub fn ensure_initialized(
        &mut self,
        load: impl FnOnce() -> Vec<Turn>,
        anchor_text: &str,
        now: DateTime<Utc>,
    ) {
        if self.turns.is_empty() {
            self.turns = load();
        }
        self.materialize_anchor(anchor_text, now);
    }

    fn materialize_anchor(&mut self, anchor_text: &str, now: DateTime<Utc>) {
        match self.turns.first_mut() {
            Some(anchor) => anchor.message = Message::system(anchor_text),
            None => self.turns.push(Turn::new(Message::system(anchor_text), now)),
        }
    }

    /// Append a turn, then truncate.
    pub fn append(&mut self, turn: Turn) -> Option<TruncationReport> {
        self.turns.push(turn);
        self.truncate()
    }

    /// Append a turn without a truncation pass.
    pub fn push_untruncated(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn usage(&self) -> ContextUsage {
        ContextUsage::measure(&self.turns, self.context_window)
    }

    /// Evict the oldest non-anchor turns if the window is over budget.
    pub fn truncate(&mut self) -> Option<TruncationReport> {
        let costs = turn_costs(&self.turns);
        let total: usize = costs.iter().sum();
        let budget = effective_context_window(self.context_window);

        if total <= budget || self.turns.len() <= 1 {
            return None;
        }

        let overflow = total - budget;
        let mut running = 0;
        let scan = costs.iter().enumerate().skip(1).find_map(|(index, cost)| {
            running += cost;
            (running > overflow).then_some(index)
        });
        let cut = scan.unwrap_or(1);

        let evicted = self.turns.drain(1..=cut).count();
        let report = TruncationReport {
            evicted,
            remaining: self.turns.len(),
            estimated_tokens: total,
            budget,
            degenerate: scan.is_none(),
        };
        debug!(
            "truncated history: evicted {} turn(s), {} remaining (~{} tokens over {} budget)",
            report.evicted, report.remaining, overflow, budget
        );
        Some(report)
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}
