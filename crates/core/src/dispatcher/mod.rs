//! Main thread dispatcher
//!
//! The [`Dispatcher`] accepts work from any thread and runs it on the main
//! host thread when the host calls [`Dispatcher::tick`]. Three submission
//! modes are supported:
//! - fire-and-forget actions ([`Dispatcher::enqueue_action`])
//! - awaitable actions resolving a [`CompletionHandle`] ([`Dispatcher::enqueue_async`])
//! - suspendable sequences handed to a cooperative scheduler
//!   ([`Dispatcher::enqueue_suspendable`])
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tickdispatch_core::{Dispatcher, SharedEnvironment};
//!
//! let dispatcher = Arc::new(Dispatcher::new(Arc::new(SharedEnvironment::default())));
//! dispatcher.activate()?;
//!
//! // From a worker thread
//! let handle = dispatcher.enqueue_async(|| Ok::<_, std::io::Error>(42));
//!
//! // From the host loop, once per tick
//! dispatcher.tick();
//! assert_eq!(handle.wait()?, 42);
//! ```

mod registry;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tickdispatch_host::{is_main_thread, HostEnvironment};

use crate::config::DispatcherConfig;
use crate::error::{DispatchError, WorkError};
use crate::sequence::{
    CooperativeScheduler, Lifetime, LifetimeToken, RunOwnership, Sequence, SequenceScheduler,
};
use crate::tasks::{completion, CompletionHandle, DrainReport, PendingWork};

pub use registry::{
    current, is_active, queue_action, queue_async, queue_suspendable, queued_work_count,
    try_current,
};

/// Coordinator between producer threads and the main host thread
pub struct Dispatcher {
    queue: PendingWork,
    host: Arc<dyn HostEnvironment>,
    scheduler: Arc<dyn SequenceScheduler>,
    config: DispatcherConfig,
    /// Read at drain time by queued sequence starts
    ownerless: Arc<AtomicBool>,
    /// Set once this dispatcher has asked the host to retain it
    retained: AtomicBool,
    /// Owned sequences are abandoned once this is dropped
    lifetime: Lifetime,
}

impl Dispatcher {
    /// Create a dispatcher with the default config and a [`CooperativeScheduler`]
    pub fn new(host: Arc<dyn HostEnvironment>) -> Self {
        let config = DispatcherConfig::default();
        Self {
            queue: PendingWork::new(),
            host,
            scheduler: Arc::new(CooperativeScheduler::new()),
            ownerless: Arc::new(AtomicBool::new(config.ownerless)),
            config,
            retained: AtomicBool::new(false),
            lifetime: Lifetime::new(),
        }
    }

    /// Use a host-provided scheduler for suspendable sequences
    pub fn with_scheduler(mut self, scheduler: Arc<dyn SequenceScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Apply a loaded configuration
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.ownerless.store(config.ownerless, Ordering::Release);
        self.config = config;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Scheduler that runs suspendable sequences
    pub fn scheduler(&self) -> &Arc<dyn SequenceScheduler> {
        &self.scheduler
    }

    /// Host environment consulted at drain time
    pub fn host(&self) -> &Arc<dyn HostEnvironment> {
        &self.host
    }

    /// Start edit-mode sequences independently of this dispatcher's lifetime
    pub fn set_ownerless(&self, ownerless: bool) {
        self.ownerless.store(ownerless, Ordering::Release);
    }

    /// Whether edit-mode sequences start independently
    pub fn is_ownerless(&self) -> bool {
        self.ownerless.load(Ordering::Acquire)
    }

    /// Number of work items waiting for the next tick
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Queue an action for the next tick
    ///
    /// This is safe to call from any thread and never blocks beyond the
    /// queue lock.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn enqueue_action<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.enqueue(Box::new(action));
    }

    /// Queue an action and get a handle resolved when it has run
    ///
    /// `Ok` fulfils the handle. `Err` or a panic faults it; neither escapes
    /// [`Dispatcher::tick`].
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn enqueue_async<T, E, F>(&self, action: F) -> CompletionHandle<T>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (mut resolver, handle) = completion();

        self.queue.enqueue(Box::new(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(action)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(WorkError::failed(error)),
                Err(payload) => Err(WorkError::from_panic(payload)),
            };
            if let Err(error) = &outcome {
                tracing::debug!("Awaitable work faulted: {}", error);
            }
            resolver.resolve(outcome);
        }));

        handle
    }

    /// Queue a suspendable sequence
    ///
    /// Ownership is decided when the item is drained: an editing host with
    /// the ownerless flag set starts the sequence independently, otherwise it
    /// is tied to this dispatcher's lifetime.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn enqueue_suspendable<S>(&self, sequence: S)
    where
        S: Sequence,
    {
        tracing::debug!(
            "Queueing sequence from {:?} host",
            self.host.mode()
        );

        let host = Arc::clone(&self.host);
        let scheduler = Arc::clone(&self.scheduler);
        let ownerless = Arc::clone(&self.ownerless);
        let token = self.lifetime.token();

        self.queue.enqueue(Box::new(move || {
            let ownership = run_ownership(
                host.is_editing(),
                ownerless.load(Ordering::Acquire),
                token,
            );
            scheduler.start(Box::new(sequence), ownership);
        }));
    }

    /// Drain and run all queued work
    ///
    /// Called by the host once per tick on the main thread.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn tick(&self) -> DrainReport {
        if is_main_thread() == Some(false) {
            tracing::warn!("Dispatcher ticked off the main host thread");
        }

        let report = self
            .queue
            .drain_all(self.config.drain_strategy, self.config.fault_policy);
        if report.invoked > 0 {
            tracing::trace!("Processed {} queued work items", report.invoked);
        }
        report
    }

    /// Register as the process-wide active dispatcher
    ///
    /// Activating an already active dispatcher is a no-op. Every new
    /// registration runs the host's runtime hook. The first activation of
    /// this dispatcher in a live (non-editing) host also asks to be retained
    /// across scene transitions; later reactivations do not ask again.
    pub fn activate(self: &Arc<Self>) -> Result<(), DispatchError> {
        if !registry::register(self)? {
            return Ok(());
        }

        self.host.init_runtime();

        if !self.retained.swap(true, Ordering::AcqRel) && !self.host.is_editing() {
            self.host.retain_across_transitions();
        }

        tracing::info!("Dispatcher activated ({:?})", self.host.mode());
        Ok(())
    }

    /// Clear the process-wide registration if it is this dispatcher
    ///
    /// Queued work stays queued and still runs on this dispatcher's ticks.
    pub fn deactivate(&self) -> bool {
        let cleared = registry::unregister(self);
        if cleared {
            tracing::info!("Dispatcher deactivated");
        }
        cleared
    }

    /// Token observing this dispatcher's lifetime
    pub fn lifetime_token(&self) -> LifetimeToken {
        self.lifetime.token()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let pending = self.queue.len();
        if pending > 0 {
            tracing::debug!("Dispatcher dropped with {} queued work items", pending);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queued", &self.queue.len())
            .field("ownerless", &self.is_ownerless())
            .field("config", &self.config)
            .finish()
    }
}

/// Pick how a drained sequence is started
fn run_ownership(editing: bool, ownerless: bool, token: LifetimeToken) -> RunOwnership {
    if editing && ownerless {
        RunOwnership::Independent
    } else {
        RunOwnership::Owned(token)
    }
}
