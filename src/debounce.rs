//! Search-as-you-type.
//!
//! Every keystroke arms a timer and cancels the one before it. Only a timer
//! that elapses without being superseded runs its task.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bookkeep_core::Resource;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::controller::ListController;

/// Default delay between the last keystroke and the search.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

#[derive(Default)]
struct Slot {
    generation: u64,
    armed: Option<JoinHandle<()>>,
}

/// Runs only the most recently scheduled task, `delay` after scheduling.
pub struct Debouncer {
    delay: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms a timer for `task`, cancelling any timer still pending.
    ///
    /// A task whose timer already fired is left to finish.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        if let Some(pending) = slot.armed.take() {
            pending.abort();
        }

        let generation = slot.generation;
        let delay = self.delay;
        let shared = Arc::clone(&self.slot);
        slot.armed = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.generation != generation {
                    return;
                }
                // Fired: a later schedule must not abort the running task.
                slot.armed = None;
            }
            task.await;
        }));
    }

    /// Cancels the pending timer, if any.
    pub fn cancel(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        if let Some(pending) = slot.armed.take() {
            pending.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Debounced search input bound to a list controller.
pub struct DebouncedSearch<R: Resource> {
    list: ListController<R>,
    debouncer: Debouncer,
}

impl<R: Resource> DebouncedSearch<R> {
    pub fn new(list: ListController<R>, delay: Duration) -> Self {
        Self {
            list,
            debouncer: Debouncer::new(delay),
        }
    }

    /// Records a keystroke; the search runs once typing pauses.
    pub fn input(&self, text: &str) {
        let list = self.list.clone();
        let term = text.to_string();
        self.debouncer.schedule(async move {
            debug!("debounced {} search for {:?}", R::NAME, term);
            list.search(&term).await;
        });
    }

    /// Drops a pending search.
    pub fn cancel(&self) {
        self.debouncer.cancel();
    }
}
