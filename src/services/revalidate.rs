//! Gallery revalidation.
//!
//! Every successful upload or delete bumps a process-wide revision. Gallery
//! responses expose it through their `ETag`, so a client holding a stale
//! listing sees a new tag after any mutation. The revision is seeded from the
//! start-up clock so tags never repeat across restarts.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone)]
pub struct Revalidator {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for Revalidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Revalidator {
    pub fn new() -> Self {
        let seed = Utc::now().timestamp_millis().max(0) as u64;
        let (tx, _rx) = watch::channel(seed);
        Self { tx: Arc::new(tx) }
    }

    pub fn revision(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Invalidate every rendered gallery.
    pub fn revalidate(&self, reason: &str) {
        self.tx.send_modify(|rev| *rev += 1);
        debug!(revision = self.revision(), "gallery revalidated after {}", reason);
    }

    /// Weak entity tag for `user_id`'s gallery at the current revision.
    pub fn etag_for(&self, user_id: &str) -> String {
        format!("W/\"{:x}-{}\"", md5::compute(user_id), self.revision())
    }
}
