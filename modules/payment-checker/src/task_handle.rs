//! In-memory per-poller handle: cancellation token, single-slot wake
//! signal, and the current backoff value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const INITIAL_DELAY: Duration = Duration::from_secs(10);
pub const MAX_DELAY: Duration = Duration::from_secs(80);

pub struct TaskHandle {
    cancel: CancellationToken,
    wake_tx: mpsc::Sender<()>,
    wake_rx: tokio::sync::Mutex<mpsc::Receiver<()>>,
    current_delay_secs: AtomicU64,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self::child_of(&CancellationToken::new())
    }

    /// Build a handle whose cancellation token is a child of `parent` — so
    /// cancelling the supervisor's root token cancels every live poller.
    pub fn child_of(parent: &CancellationToken) -> Self {
        let (wake_tx, wake_rx) = mpsc::channel(1);
        Self {
            cancel: parent.child_token(),
            wake_tx,
            wake_rx: tokio::sync::Mutex::new(wake_rx),
            current_delay_secs: AtomicU64::new(INITIAL_DELAY.as_secs()),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Non-blocking wake send. A pending wake already in the slot means
    /// this is a no-op — the buffer never backs up.
    pub fn try_wake(&self) -> bool {
        match self.wake_tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => false,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    pub async fn recv_wake(&self) -> Option<()> {
        self.wake_rx.lock().await.recv().await
    }

    pub fn current_delay(&self) -> Duration {
        Duration::from_secs(self.current_delay_secs.load(Ordering::Relaxed))
    }

    pub fn set_delay(&self, delay: Duration) {
        self.current_delay_secs
            .store(delay.as_secs(), Ordering::Relaxed);
    }

    pub fn reset_delay(&self) {
        self.set_delay(INITIAL_DELAY);
    }

    pub fn grow_delay(&self) {
        let grown = std::cmp::min(self.current_delay() * 2, MAX_DELAY);
        self.set_delay(grown);
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence_caps_at_max_delay() {
        let handle = TaskHandle::new();
        assert_eq!(handle.current_delay(), Duration::from_secs(10));
        handle.grow_delay();
        assert_eq!(handle.current_delay(), Duration::from_secs(20));
        handle.grow_delay();
        assert_eq!(handle.current_delay(), Duration::from_secs(40));
        handle.grow_delay();
        assert_eq!(handle.current_delay(), Duration::from_secs(80));
        handle.grow_delay();
        assert_eq!(handle.current_delay(), Duration::from_secs(80));
    }

    #[test]
    fn wake_after_growth_resets_to_initial() {
        let handle = TaskHandle::new();
        handle.grow_delay();
        handle.grow_delay();
        handle.grow_delay();
        assert_eq!(handle.current_delay(), Duration::from_secs(80));
        handle.reset_delay();
        assert_eq!(handle.current_delay(), Duration::from_secs(10));
    }

    #[test]
    fn repeated_wakes_collapse_into_one_pending_signal() {
        let handle = TaskHandle::new();
        assert!(handle.try_wake());
        assert!(!handle.try_wake());
    }

    #[tokio::test]
    async fn wake_is_consumed_and_slot_reopens() {
        let handle = TaskHandle::new();
        handle.try_wake();
        assert_eq!(handle.recv_wake().await, Some(()));
        assert!(handle.try_wake());
    }
}
