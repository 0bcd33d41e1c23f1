//! Conversation persistence.
//!
//! - [`store`]: the [`HistoryStore`] trait with file and in-memory backends.
//! - [`manager`]: [`HistoryManager`], markdown and prompt-list views over a thread.

pub mod manager;
pub mod store;

pub use manager::HistoryManager;
pub use store::{
    FileHistoryStore, HistoryStore, INTERACTIVE_THREAD_PREFIX, MemoryHistoryStore,
    generate_thread_slug,
};
