//! Main thread work queue
//!
//! Allows background threads to queue work to execute on the main host thread.
//! Work is drained in FIFO order once per tick.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};

use crate::error::WorkError;

/// A unit of work to execute on the main thread
pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// How `drain_all` treats the queue lock while invoking items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStrategy {
    /// Hold the lock for the whole drain, invoking items under it.
    ///
    /// Only items present when the lock is taken run. Work enqueued by an
    /// item on the draining thread runs on the next drain.
    HoldLock,
    /// Swap the buffer out under the lock, then invoke with the lock released.
    ///
    /// Work enqueued during the drain runs on the next drain.
    #[default]
    Swap,
}

/// What happens when a plain work item panics during a drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Log the fault and keep draining
    #[default]
    Isolate,
    /// Re-raise the panic out of the drain; undrained items stay queued
    Propagate,
}

/// Outcome of a single drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items invoked, including faulted ones
    pub invoked: usize,
    /// Items that panicked and were isolated
    pub faulted: usize,
}

/// Thread-safe FIFO of deferred work
///
/// The lock is re-entrant so an item invoked under [`DrainStrategy::HoldLock`]
/// can enqueue more work from the draining thread. That work waits for the
/// next drain under either strategy.
pub struct PendingWork {
    items: ReentrantMutex<RefCell<VecDeque<WorkItem>>>,
}

impl PendingWork {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            items: ReentrantMutex::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Queue an item for the next drain
    ///
    /// This is safe to call from any thread and never fails.
    pub fn enqueue(&self, item: WorkItem) {
        let guard = self.items.lock();
        guard.borrow_mut().push_back(item);
    }

    /// Number of items currently queued
    pub fn len(&self) -> usize {
        self.items.lock().borrow().len()
    }

    /// Whether the queue is currently empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and invoke queued items in FIFO order
    ///
    /// Must be called from the main thread. With [`FaultPolicy::Propagate`]
    /// a panicking item unwinds out of this call after the items it did not
    /// reach are put back at the front of the queue.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn drain_all(&self, strategy: DrainStrategy, policy: FaultPolicy) -> DrainReport {
        let mut report = DrainReport::default();

        match strategy {
            DrainStrategy::HoldLock => {
                let guard = self.items.lock();
                let present = guard.borrow().len();
                for _ in 0..present {
                    // Release the borrow before invoking so the item can enqueue
                    let next = guard.borrow_mut().pop_front();
                    let Some(item) = next else { break };

                    if let Err(payload) = invoke(item, policy, &mut report) {
                        drop(guard);
                        panic::resume_unwind(payload);
                    }
                }
            }
            DrainStrategy::Swap => {
                let mut batch = {
                    let guard = self.items.lock();
                    let taken = std::mem::take(&mut *guard.borrow_mut());
                    taken
                };

                while let Some(item) = batch.pop_front() {
                    if let Err(payload) = invoke(item, policy, &mut report) {
                        self.requeue_front(batch);
                        panic::resume_unwind(payload);
                    }
                }
            }
        }

        report
    }

    /// Put undrained items back ahead of anything queued meanwhile
    fn requeue_front(&self, batch: VecDeque<WorkItem>) {
        if batch.is_empty() {
            return;
        }
        let guard = self.items.lock();
        let mut items = guard.borrow_mut();
        for item in batch.into_iter().rev() {
            items.push_front(item);
        }
    }
}

impl Default for PendingWork {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PendingWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWork")
            .field("len", &self.len())
            .finish()
    }
}

/// Invoke one item behind a catch boundary
fn invoke(
    item: WorkItem,
    policy: FaultPolicy,
    report: &mut DrainReport,
) -> Result<(), Box<dyn Any + Send>> {
    report.invoked += 1;

    match panic::catch_unwind(AssertUnwindSafe(item)) {
        Ok(()) => Ok(()),
        Err(payload) => match policy {
            FaultPolicy::Isolate => {
                report.faulted += 1;
                tracing::error!("Queued work faulted: {}", WorkError::from_panic(payload));
                Ok(())
            }
            FaultPolicy::Propagate => Err(payload),
        },
    }
}
