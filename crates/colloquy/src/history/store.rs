//! The persistence collaborator.
//!
//! A [`HistoryStore`] holds one turn sequence per thread and has a current
//! thread that `read`/`write` operate on. [`FileHistoryStore`] keeps one
//! JSON file per thread; [`MemoryHistoryStore`] is an in-process map whose
//! clones share state, handy for tests that need to inspect what the
//! client persisted.

use crate::Turn;
use crate::error::HistoryError;
use crate::ids::unique_id;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Thread-slug prefix for interactive sessions.
pub const INTERACTIVE_THREAD_PREFIX: &str = "int_";

/// A fresh, unique thread name.
pub fn generate_thread_slug(prefix: &str) -> String {
    unique_id(prefix)
}

pub trait HistoryStore: Send {
    /// Turns of the current thread. A thread never written reads as empty.
    fn read(&self) -> Result<Vec<Turn>, HistoryError>;

    /// Replace the current thread's turns.
    fn write(&mut self, turns: &[Turn]) -> Result<(), HistoryError>;

    /// Turns of any thread.
    fn read_thread(&self, thread: &str) -> Result<Vec<Turn>, HistoryError>;

    fn set_thread(&mut self, thread: &str);

    fn thread(&self) -> &str;
}

// ── File store ─────────────────────────────────────────────────────

/// One `<thread>.json` file per thread under a directory.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    dir: PathBuf,
    thread: String,
}

impl FileHistoryStore {
    /// Open (creating if needed) a history directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            thread: "default".to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a thread's file. The name must stay inside the directory.
    fn thread_path(&self, thread: &str) -> Result<PathBuf, HistoryError> {
        let escapes = thread.is_empty()
            || thread.contains("..")
            || thread.contains(['/', '\\']);
        if escapes {
            return Err(HistoryError::Other(format!("invalid thread name: {thread:?}")));
        }
        Ok(self.dir.join(format!("{thread}.json")))
    }
}

impl HistoryStore for FileHistoryStore {
    fn read(&self) -> Result<Vec<Turn>, HistoryError> {
        self.read_thread(&self.thread)
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    fn write(&mut self, turns: &[Turn]) -> Result<(), HistoryError> {
        let final_path = self.thread_path(&self.thread)?;
        let tmp_path = self.dir.join(format!(".{}.json.tmp", self.thread));

        let json = serde_json::to_string_pretty(turns)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &final_path)?;
        trace!("wrote {} turn(s) to {}", turns.len(), final_path.display());
        Ok(())
    }

    fn read_thread(&self, thread: &str) -> Result<Vec<Turn>, HistoryError> {
        let path = self.thread_path(thread)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn set_thread(&mut self, thread: &str) {
        self.thread = thread.to_string();
    }

    fn thread(&self) -> &str {
        &self.thread
    }
}

// ── Memory store ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryState {
    threads: BTreeMap<String, Vec<Turn>>,
    fail_writes: bool,
}

/// In-memory store. Clones share the same threads.
#[derive(Debug, Clone)]
pub struct MemoryHistoryStore {
    state: Arc<Mutex<MemoryState>>,
    thread: String,
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            thread: "default".to_string(),
        }
    }

    /// Seed a thread's contents.
    pub fn with_thread(self, thread: &str, turns: Vec<Turn>) -> Self {
        self.lock().threads.insert(thread.to_string(), turns);
        self
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Snapshot of a thread's contents.
    pub fn snapshot(&self, thread: &str) -> Vec<Turn> {
        self.lock().threads.get(thread).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn read(&self) -> Result<Vec<Turn>, HistoryError> {
        self.read_thread(&self.thread)
    }

    fn write(&mut self, turns: &[Turn]) -> Result<(), HistoryError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(HistoryError::Other("history store is read-only".to_string()));
        }
        state.threads.insert(self.thread.clone(), turns.to_vec());
        Ok(())
    }

    fn read_thread(&self, thread: &str) -> Result<Vec<Turn>, HistoryError> {
        Ok(self.snapshot(thread))
    }

    fn set_thread(&mut self, thread: &str) {
        self.thread = thread.to_string();
    }

    fn thread(&self) -> &str {
        &self.thread
    }
}
