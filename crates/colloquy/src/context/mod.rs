//! Conversation context: cost estimates and the truncating window.
//!
//! - [`budget`]: the whitespace-word cost heuristic and the effective window
//!   (the configured size minus a fixed 20% margin).
//! - [`window`]: [`ConversationWindow`], the anchored turn sequence that
//!   evicts its oldest turns when the estimate exceeds the budget.

pub mod budget;
pub mod window;

pub use budget::{ContextUsage, effective_context_window, estimate_turn_cost};
pub use window::{ConversationWindow, TruncationReport};
