//! Storage-failure escalation (spec.md §7): a broker whose log reads or
//! writes keep failing is not in a state worth keeping alive. Rather
//! than let every caller independently decide when enough is enough,
//! [`yak_storage::TopicStore`](../../yak_storage/struct.TopicStore.html)
//! tracks the streak in one place and trips a shared flag every reader
//! (background tasks, `main`) can watch.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::MAX_CONSECUTIVE_STORAGE_FAILURES;

/// Cloneable handle onto one broker's consecutive-storage-failure streak.
#[derive(Clone, Default)]
pub struct FatalGuard {
    consecutive: Arc<AtomicU32>,
    tripped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl FatalGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a storage failure. Returns `true` exactly once, the call
    /// that pushes the streak to [`MAX_CONSECUTIVE_STORAGE_FAILURES`].
    pub fn record_storage_failure(&self) -> bool {
        let n = self.consecutive.fetch_add(1, Ordering::SeqCst) + 1;
        if n == MAX_CONSECUTIVE_STORAGE_FAILURES {
            self.tripped.store(true, Ordering::SeqCst);
            self.notify.notify_waiters();
            true
        } else {
            false
        }
    }

    /// Resets the streak after a storage operation succeeds.
    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Resolves once the failure streak has tripped. `main` selects on
    /// this alongside its other shutdown signals.
    pub async fn tripped(&self) {
        loop {
            if self.is_tripped() {
                return;
            }
            self.notify.notified().await;
        }
    }
}
