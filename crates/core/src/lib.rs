//! tickdispatch - Core Logic
//!
//! This crate contains the main thread work queue, the dispatcher that
//! feeds it, and the cooperative scheduler for suspendable sequences.
//!
//! # Re-exports
//!
//! This crate re-exports the host crate for convenience:
//! - [`host`] - Host environment predicate and main thread globals

use tracing::info;

pub use tickdispatch_host as host;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod sequence;
pub mod tasks;

// Re-export commonly used items
pub use config::{ConfigError, ConfigResult, DispatcherConfig};
pub use dispatcher::{
    current, is_active, queue_action, queue_async, queue_suspendable, queued_work_count,
    try_current, Dispatcher,
};
pub use error::{DispatchError, WorkError};
pub use hooks::{frame_count, on_host_tick, register_frame_callback, unregister_frame_callback};
pub use sequence::{
    CooperativeScheduler, Lifetime, LifetimeToken, RunOwnership, Sequence, SequenceScheduler, Step,
};
pub use tasks::{
    CompletionHandle, CompletionState, DrainReport, DrainStrategy, FaultPolicy, PendingWork,
};

// Re-export host types
pub use tickdispatch_host::{HostEnvironment, HostMode, SharedEnvironment};

/// Shutdown the dispatcher
///
/// Deactivates the active dispatcher, if any. Called from the host when it
/// unloads.
pub fn shutdown() {
    info!("tickdispatch shutting down...");
    if let Some(dispatcher) = try_current() {
        dispatcher.deactivate();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::{const_mutex, Mutex, MutexGuard};

    static SERIAL: Mutex<()> = const_mutex(());

    /// Serializes tests that touch the process-wide registration
    pub(crate) fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock()
    }
}
