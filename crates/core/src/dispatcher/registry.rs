//! Process-wide active dispatcher
//!
//! Producers that are not handed a dispatcher directly submit through these
//! helpers. Every helper fails fast with [`DispatchError::NoActiveDispatcher`]
//! when nothing is registered.

use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use super::Dispatcher;
use crate::error::DispatchError;
use crate::sequence::Sequence;
use crate::tasks::CompletionHandle;

static ACTIVE: LazyLock<RwLock<Option<Arc<Dispatcher>>>> = LazyLock::new(|| RwLock::new(None));

/// Register `dispatcher` as active
///
/// Returns `Ok(false)` when it already is.
pub(super) fn register(dispatcher: &Arc<Dispatcher>) -> Result<bool, DispatchError> {
    let mut active = ACTIVE.write();
    match active.as_ref() {
        Some(current) if Arc::ptr_eq(current, dispatcher) => Ok(false),
        Some(_) => {
            tracing::warn!("Refusing to activate a second dispatcher");
            Err(DispatchError::AlreadyActive)
        }
        None => {
            *active = Some(Arc::clone(dispatcher));
            Ok(true)
        }
    }
}

/// Clear the registration if it belongs to `dispatcher`
pub(super) fn unregister(dispatcher: &Dispatcher) -> bool {
    let mut active = ACTIVE.write();
    match active.as_ref() {
        Some(current) if std::ptr::eq(Arc::as_ptr(current), dispatcher) => {
            *active = None;
            true
        }
        _ => false,
    }
}

/// The active dispatcher
pub fn current() -> Result<Arc<Dispatcher>, DispatchError> {
    try_current().ok_or(DispatchError::NoActiveDispatcher)
}

/// The active dispatcher, if any
pub fn try_current() -> Option<Arc<Dispatcher>> {
    ACTIVE.read().clone()
}

/// Check if a dispatcher is registered
pub fn is_active() -> bool {
    ACTIVE.read().is_some()
}

/// Queue an action on the active dispatcher
///
/// This is safe to call from any thread.
#[tracing::instrument(skip(action))]
pub fn queue_action<F>(action: F) -> Result<(), DispatchError>
where
    F: FnOnce() + Send + 'static,
{
    current()?.enqueue_action(action);
    Ok(())
}

/// Queue an awaitable action on the active dispatcher
#[tracing::instrument(skip(action))]
pub fn queue_async<T, E, F>(action: F) -> Result<CompletionHandle<T>, DispatchError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Ok(current()?.enqueue_async(action))
}

/// Queue a suspendable sequence on the active dispatcher
#[tracing::instrument(skip(sequence))]
pub fn queue_suspendable<S>(sequence: S) -> Result<(), DispatchError>
where
    S: Sequence,
{
    current()?.enqueue_suspendable(sequence);
    Ok(())
}

/// Check how much work is queued on the active dispatcher
pub fn queued_work_count() -> Result<usize, DispatchError> {
    Ok(current()?.queued_len())
}
