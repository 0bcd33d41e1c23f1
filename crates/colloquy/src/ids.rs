//! Unique identifiers for thread slugs and multipart boundaries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// A process-unique identifier: `<prefix><nanos-hex><counter-hex>`.
pub fn unique_id(prefix: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Counter covers calls within the same clock tick.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}{ts:x}{count:04x}")
}
