//! Concurrency limiting with FIFO admission.
//!
//! [`ConcurrencyGate`] caps the number of requests in flight. Callers that
//! find the gate full wait in a queue and are admitted strictly in arrival
//! order as slots free up. A slot is held by a [`GatePermit`] and returned
//! when the permit drops, so every exit path of a request releases it.
//!
//! Releasing a slot hands it directly to the oldest live waiter under the
//! same lock, which keeps a newly arriving caller from taking the slot
//! between the release and the wake-up.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::ClientError;

struct GateState {
    active: usize,
    /// `None` means unbounded.
    limit: Option<usize>,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl GateState {
    fn has_capacity(&self) -> bool {
        self.limit.is_none_or(|limit| self.active < limit)
    }
}

/// Admission control for in-flight requests.
///
/// Cloning yields another handle to the same gate.
///
/// # Example
///
/// ```
/// use courier_client::ConcurrencyGate;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gate = ConcurrencyGate::new(1);
///
/// let permit = gate.acquire().await;
/// assert_eq!(gate.active(), 1);
///
/// drop(permit);
/// assert_eq!(gate.active(), 0);
/// # }
/// ```
#[derive(Clone)]
pub struct ConcurrencyGate {
    state: Arc<Mutex<GateState>>,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `limit` requests at once.
    ///
    /// A limit of zero means unbounded.
    pub fn new(limit: usize) -> Self {
        let limit = (limit > 0).then_some(limit);
        Self {
            state: Arc::new(Mutex::new(GateState {
                active: 0,
                limit,
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Create a gate without a limit.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// The configured limit, `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        self.state.lock().limit
    }

    /// Number of slots currently held.
    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    /// Number of callers queued for a slot.
    pub fn waiting(&self) -> usize {
        self.state
            .lock()
            .waiters
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Wait for a slot.
    pub async fn acquire(&self) -> GatePermit {
        loop {
            let rx = {
                let mut state = self.state.lock();
                if state.has_capacity() {
                    state.active += 1;
                    return GatePermit { gate: self.clone() };
                }
                // Waiters cancelled while queued leave a closed sender.
                state.waiters.retain(|tx| !tx.is_closed());
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    active = state.active,
                    queued = state.waiters.len(),
                    "concurrency limit reached, queueing"
                );
                rx
            };

            let mut waiter = Waiter {
                gate: self,
                rx: Some(rx),
            };
            if waiter.granted().await {
                return GatePermit { gate: self.clone() };
            }
        }
    }

    /// Wait for a slot unless `cancel` fires first.
    ///
    /// A cancelled caller leaves the queue without consuming a slot.
    pub async fn acquire_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<GatePermit, ClientError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Aborted),
            permit = self.acquire() => Ok(permit),
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        while state.has_capacity() {
            let Some(tx) = state.waiters.pop_front() else {
                break;
            };
            // The slot is counted before the waiter runs; a waiter that
            // went away in the meantime hands it back in `Waiter::drop`.
            if tx.send(()).is_ok() {
                state.active += 1;
            }
        }
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for ConcurrencyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ConcurrencyGate")
            .field("active", &state.active)
            .field("limit", &state.limit)
            .field("waiting", &state.waiters.len())
            .finish()
    }
}

/// A queued acquisition.
struct Waiter<'a> {
    gate: &'a ConcurrencyGate,
    rx: Option<oneshot::Receiver<()>>,
}

impl Waiter<'_> {
    /// Returns true once a slot has been handed over.
    async fn granted(&mut self) -> bool {
        let Some(rx) = self.rx.as_mut() else {
            return false;
        };
        let granted = rx.await.is_ok();
        self.rx = None;
        granted
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.gate.release();
            }
        }
    }
}

/// A held slot of a [`ConcurrencyGate`], released on drop.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct GatePermit {
    gate: ConcurrencyGate,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

impl fmt::Debug for GatePermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePermit").finish_non_exhaustive()
    }
}
