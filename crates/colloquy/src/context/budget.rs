//! Approximate token accounting.
//!
//! Costs are a whitespace-word heuristic, not a tokenizer: for each turn,
//! `(characters in words + number of words) / 2`. Media content counts as
//! zero. Estimates are recomputed on every pass and never cached.

use crate::Turn;

/// Share of the context window held back as a safety margin, in percent.
pub const SAFETY_BUFFER_PERCENT: usize = 20;

/// Approximate cost of a single turn.
pub fn estimate_turn_cost(turn: &Turn) -> usize {
    turn.text().map_or(0, estimate_text_cost)
}

/// Approximate cost of a piece of text.
pub fn estimate_text_cost(text: &str) -> usize {
    let (chars, words) = text
        .split_whitespace()
        .fold((0, 0), |(chars, words), word| (chars + word.chars().count(), words + 1));
    (chars + words) / 2
}

/// Per-turn costs, in order.
pub fn turn_costs(turns: &[Turn]) -> Vec<usize> {
    turns.iter().map(estimate_turn_cost).collect()
}

/// Budget left for history once the safety margin is reserved.
pub fn effective_context_window(window: usize) -> usize {
    window * (100 - SAFETY_BUFFER_PERCENT) / 100
}

/// Snapshot of estimated usage against the effective window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextUsage {
    pub estimated_tokens: usize,
    /// Effective (post-margin) budget.
    pub budget: usize,
    /// Usage as a fraction (0.0 to 1.0+).
    pub usage_pct: f64,
}

impl ContextUsage {
    pub fn measure(turns: &[Turn], context_window: usize) -> Self {
        let estimated_tokens = turn_costs(turns).iter().sum();
        let budget = effective_context_window(context_window);
        let usage_pct = if budget > 0 {
            estimated_tokens as f64 / budget as f64
        } else {
            1.0
        };
        Self {
            estimated_tokens,
            budget,
            usage_pct,
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.estimated_tokens > self.budget
    }

    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "context: ~{} tokens ({:.0}% of {})",
            self.estimated_tokens,
            self.usage_pct * 100.0,
            self.budget,
        )
    }
}
