//! Registry of in-flight requests.
//!
//! Every dispatched request registers a cancellation token here for its
//! lifetime. [`PendingCalls::cancel_all`] aborts everything still running.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub(crate) struct PendingCalls {
    next_id: AtomicU64,
    calls: Mutex<HashMap<u64, CancellationToken>>,
}

impl PendingCalls {
    /// Register a call. Its token is a child of `parent` when given, so the
    /// caller's own cancellation reaches it too.
    pub(crate) fn register(
        self: &Arc<Self>,
        parent: Option<&CancellationToken>,
    ) -> PendingGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = parent
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        self.calls.lock().insert(id, token.clone());
        PendingGuard {
            calls: Arc::clone(self),
            id,
            token,
        }
    }

    /// Cancel every registered call. Returns how many were cancelled.
    pub(crate) fn cancel_all(&self) -> usize {
        let calls = self.calls.lock();
        for token in calls.values() {
            token.cancel();
        }
        calls.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Keeps a call registered until dropped.
#[derive(Debug)]
pub(crate) struct PendingGuard {
    calls: Arc<PendingCalls>,
    id: u64,
    token: CancellationToken,
}

impl PendingGuard {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.calls.calls.lock().remove(&self.id);
    }
}
