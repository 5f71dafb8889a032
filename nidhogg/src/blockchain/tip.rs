//! Single-writer discipline around the chain tip.
//!
//! The tip lives in a single-slot cell: `take` empties it (waiting until
//! it is full), `put` refills it. A task that wants to move the tip takes
//! the value, does its work, and puts the successor back; everyone else
//! reads the persisted tip through the store and may observe a stale
//! value, never a torn one.

use chain_model::HeaderHash;
use parking_lot::Mutex;
use std::cell::Cell;
use std::future::Future;
use tokio::sync::Semaphore;

pub struct TipSemaphore {
    slot: Mutex<Option<HeaderHash>>,
    filled: Semaphore,
}

impl TipSemaphore {
    pub fn new(tip: HeaderHash) -> Self {
        TipSemaphore {
            slot: Mutex::new(Some(tip)),
            filled: Semaphore::new(1),
        }
    }

    /// Remove and return the tip, waiting until the slot is full.
    pub async fn take(&self) -> HeaderHash {
        let permit = self
            .filled
            .acquire()
            .await
            .expect("tip semaphore never closes");
        permit.forget();
        self.slot
            .lock()
            .take()
            .expect("tip slot must be full while a permit is held")
    }

    /// Fill the slot. Calling this while the slot is full is a bug.
    pub fn put(&self, tip: HeaderHash) {
        let mut slot = self.slot.lock();
        assert!(slot.is_none(), "tip semaphore put into a full slot");
        *slot = Some(tip);
        drop(slot);
        self.filled.add_permits(1);
    }

    /// Run `action` as the single writer of the tip.
    ///
    /// The current tip is taken out, `action` receives it and returns the
    /// new one, which is installed on success. If the action errors out or
    /// the future is dropped at a suspension point, the original tip is
    /// restored, so the slot is never left empty.
    pub async fn with_update<F, Fut, E>(&self, action: F) -> Result<HeaderHash, E>
    where
        F: FnOnce(HeaderHash) -> Fut,
        Fut: Future<Output = Result<HeaderHash, E>>,
    {
        let previous = self.take().await;
        let restore = RestoreTip {
            semaphore: self,
            tip: previous,
            armed: Cell::new(true),
        };
        let next = action(previous).await?;
        restore.armed.set(false);
        self.put(next);
        Ok(next)
    }
}

struct RestoreTip<'a> {
    semaphore: &'a TipSemaphore,
    tip: HeaderHash,
    armed: Cell<bool>,
}

impl Drop for RestoreTip<'_> {
    fn drop(&mut self) {
        if self.armed.get() {
            self.semaphore.put(self.tip);
        }
    }
}
