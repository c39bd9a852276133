//! Completion handles for awaitable work
//!
//! A [`CompletionHandle`] is observed by the producer; the paired
//! [`Resolver`] travels inside the queued work item and resolves it once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::WorkError;

/// Observable state of a completion handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    /// The work has not run yet
    Pending,
    /// The work ran to completion
    Fulfilled,
    /// The work failed, panicked or was abandoned
    Faulted,
}

enum Slot<T> {
    Pending,
    Fulfilled(T),
    Faulted(WorkError),
}

struct Inner<T> {
    slot: Slot<T>,
    wakers: Vec<Waker>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

/// Create a linked resolver/handle pair
pub fn completion<T>() -> (Resolver<T>, CompletionHandle<T>) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            slot: Slot::Pending,
            wakers: Vec::new(),
        }),
        ready: Condvar::new(),
    });

    (
        Resolver {
            shared: Arc::clone(&shared),
            resolved: false,
        },
        CompletionHandle { shared },
    )
}

/// Write side of a completion handle
///
/// Dropping an unresolved resolver faults the handle with
/// [`WorkError::Abandoned`].
pub struct Resolver<T> {
    shared: Arc<Shared<T>>,
    resolved: bool,
}

impl<T> Resolver<T> {
    /// Resolve as fulfilled. Returns `false` if already resolved.
    pub fn fulfill(&mut self, value: T) -> bool {
        self.resolve(Ok(value))
    }

    /// Resolve as faulted. Returns `false` if already resolved.
    pub fn fault(&mut self, error: WorkError) -> bool {
        self.resolve(Err(error))
    }

    /// Resolve with a result. Later calls are ignored.
    pub fn resolve(&mut self, result: Result<T, WorkError>) -> bool {
        let wakers = {
            let mut inner = self.shared.inner.lock();
            if !matches!(inner.slot, Slot::Pending) {
                tracing::trace!("Ignoring second resolution of completion handle");
                return false;
            }
            inner.slot = match result {
                Ok(value) => Slot::Fulfilled(value),
                Err(error) => Slot::Faulted(error),
            };
            std::mem::take(&mut inner.wakers)
        };

        self.resolved = true;
        self.shared.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if !self.resolved {
            self.resolve(Err(WorkError::Abandoned));
        }
    }
}

/// Read side of a completion handle
///
/// Cheap to clone; every clone observes the same resolution. Never block on
/// a handle from the main thread before the work has been drained.
pub struct CompletionHandle<T = ()> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CompletionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> CompletionHandle<T> {
    /// Current state
    pub fn state(&self) -> CompletionState {
        match self.shared.inner.lock().slot {
            Slot::Pending => CompletionState::Pending,
            Slot::Fulfilled(_) => CompletionState::Fulfilled,
            Slot::Faulted(_) => CompletionState::Faulted,
        }
    }

    /// True until the work has run or been abandoned
    pub fn is_pending(&self) -> bool {
        self.state() == CompletionState::Pending
    }

    /// True once the work ran to completion
    pub fn is_fulfilled(&self) -> bool {
        self.state() == CompletionState::Fulfilled
    }

    /// True once the work failed, panicked or was abandoned
    pub fn is_faulted(&self) -> bool {
        self.state() == CompletionState::Faulted
    }

    /// The attached error, if faulted
    pub fn error(&self) -> Option<WorkError> {
        match &self.shared.inner.lock().slot {
            Slot::Faulted(error) => Some(error.clone()),
            _ => None,
        }
    }
}

impl<T: Clone> CompletionHandle<T> {
    /// The result if resolved, without blocking
    pub fn try_result(&self) -> Option<Result<T, WorkError>> {
        read_slot(&self.shared.inner.lock().slot)
    }

    /// Block the calling thread until resolved
    pub fn wait(&self) -> Result<T, WorkError> {
        let mut inner = self.shared.inner.lock();
        loop {
            if let Some(result) = read_slot(&inner.slot) {
                return result;
            }
            self.shared.ready.wait(&mut inner);
        }
    }

    /// Block until resolved or the timeout elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, WorkError>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        loop {
            if let Some(result) = read_slot(&inner.slot) {
                return Some(result);
            }
            if self.shared.ready.wait_until(&mut inner, deadline).timed_out() {
                return read_slot(&inner.slot);
            }
        }
    }
}

impl<T: Clone> Future for CompletionHandle<T> {
    type Output = Result<T, WorkError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.shared.inner.lock();
        if let Some(result) = read_slot(&inner.slot) {
            return Poll::Ready(result);
        }
        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T> std::fmt::Debug for CompletionHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("state", &self.state())
            .finish()
    }
}

fn read_slot<T: Clone>(slot: &Slot<T>) -> Option<Result<T, WorkError>> {
    match slot {
        Slot::Pending => None,
        Slot::Fulfilled(value) => Some(Ok(value.clone())),
        Slot::Faulted(error) => Some(Err(error.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fulfill_visible_to_all_clones() {
        let (mut resolver, handle) = completion::<u32>();
        let other = handle.clone();
        assert!(handle.is_pending());
        assert!(handle.try_result().is_none());

        assert!(resolver.fulfill(7));
        assert!(handle.is_fulfilled());
        assert_eq!(other.try_result().unwrap().unwrap(), 7);
        assert!(other.error().is_none());
    }

    #[test]
    fn test_second_resolution_ignored() {
        let (mut resolver, handle) = completion::<()>();
        assert!(resolver.fault(WorkError::failed("first")));
        assert!(!resolver.fulfill(()));
        assert!(!resolver.fault(WorkError::failed("second")));

        assert!(handle.is_faulted());
        assert_eq!(handle.error().unwrap().to_string(), "first");
    }

    #[test]
    fn test_dropped_resolver_abandons() {
        let (resolver, handle) = completion::<()>();
        drop(resolver);
        assert!(matches!(handle.error(), Some(WorkError::Abandoned)));
    }

    #[test]
    fn test_wait_across_threads() {
        let (mut resolver, handle) = completion::<&'static str>();
        let waiter = {
            let handle = handle.clone();
            std::thread::spawn(move || handle.wait())
        };

        std::thread::sleep(Duration::from_millis(10));
        resolver.fulfill("done");
        assert_eq!(waiter.join().unwrap().unwrap(), "done");
    }

    #[test]
    fn test_wait_timeout_expires_while_pending() {
        let (_resolver, handle) = completion::<()>();
        assert!(handle.wait_timeout(Duration::from_millis(5)).is_none());
        assert!(handle.is_pending());
    }

    #[test]
    fn test_await_handle() {
        let (mut resolver, handle) = completion::<u8>();
        let awaiting = std::thread::spawn(move || futures::executor::block_on(handle));

        std::thread::sleep(Duration::from_millis(10));
        resolver.fulfill(3);
        assert_eq!(awaiting.join().unwrap().unwrap(), 3);
    }
}
