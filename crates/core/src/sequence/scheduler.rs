//! Cooperative scheduler for suspendable sequences
//!
//! Sequences are started from the main thread during a drain and resumed
//! once per scheduler pass. A sequence owned by a [`Lifetime`] is abandoned
//! on the first pass after that lifetime ends.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{Sequence, Step};
use crate::error::WorkError;

/// Lifetime that owned sequences are tied to
///
/// Sequences started with a token from this lifetime stop being resumed
/// once it is dropped.
#[derive(Debug, Default)]
pub struct Lifetime {
    alive: Arc<()>,
}

impl Lifetime {
    /// Start a new lifetime
    pub fn new() -> Self {
        Self::default()
    }

    /// Weak token observing this lifetime
    pub fn token(&self) -> LifetimeToken {
        LifetimeToken(Arc::downgrade(&self.alive))
    }
}

/// Weak observer of a [`Lifetime`]
#[derive(Debug, Clone)]
pub struct LifetimeToken(Weak<()>);

impl LifetimeToken {
    /// Whether the observed lifetime has not ended yet
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// Who a started sequence belongs to
#[derive(Debug, Clone)]
pub enum RunOwnership {
    /// Tied to an owner; abandoned when the owner's lifetime ends
    Owned(LifetimeToken),
    /// Runs until it finishes regardless of any owner
    Independent,
}

impl RunOwnership {
    fn is_abandoned(&self) -> bool {
        match self {
            RunOwnership::Owned(token) => !token.is_alive(),
            RunOwnership::Independent => false,
        }
    }
}

/// Counters for one scheduler pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Sequences resumed this pass
    pub resumed: usize,
    /// Sequences that finished
    pub completed: usize,
    /// Sequences that faulted or panicked
    pub faulted: usize,
    /// Sequences dropped because their owner is gone
    pub abandoned: usize,
}

/// Facility that runs suspendable sequences
pub trait SequenceScheduler: Send + Sync {
    /// Start a sequence. Runs its first step immediately.
    fn start(&self, sequence: Box<dyn Sequence>, ownership: RunOwnership);

    /// Resume every live sequence by one step
    fn advance(&self) -> AdvanceReport;

    /// Number of sequences still suspended
    fn live_count(&self) -> usize;
}

struct LiveSequence {
    sequence: Box<dyn Sequence>,
    ownership: RunOwnership,
}

/// Default scheduler driven by the host tick
#[derive(Default)]
pub struct CooperativeScheduler {
    live: Mutex<Vec<LiveSequence>>,
}

impl CooperativeScheduler {
    /// Create a scheduler with no live sequences
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceScheduler for CooperativeScheduler {
    fn start(&self, mut sequence: Box<dyn Sequence>, ownership: RunOwnership) {
        if ownership.is_abandoned() {
            tracing::debug!("Sequence owner already gone, not starting");
            return;
        }

        // First step runs without the lock so it may start further sequences
        match resume(sequence.as_mut()) {
            Step::Suspend => self.live.lock().push(LiveSequence {
                sequence,
                ownership,
            }),
            Step::Done => tracing::trace!("Sequence finished on first step"),
            Step::Fault(e) => tracing::error!("Sequence faulted: {}", e),
        }
    }

    fn advance(&self) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        let batch = std::mem::take(&mut *self.live.lock());
        if batch.is_empty() {
            return report;
        }

        let mut survivors = Vec::with_capacity(batch.len());
        for mut live in batch {
            if live.ownership.is_abandoned() {
                report.abandoned += 1;
                continue;
            }

            report.resumed += 1;
            match resume(live.sequence.as_mut()) {
                Step::Suspend => survivors.push(live),
                Step::Done => report.completed += 1,
                Step::Fault(e) => {
                    report.faulted += 1;
                    tracing::error!("Sequence faulted: {}", e);
                }
            }
        }

        // Sequences started during this pass go after the survivors
        let mut live = self.live.lock();
        let started = std::mem::replace(&mut *live, survivors);
        live.extend(started);

        if report.abandoned > 0 {
            tracing::debug!("Abandoned {} sequences whose owner is gone", report.abandoned);
        }
        report
    }

    fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

/// Resume one step, converting a panic into a fault
fn resume(sequence: &mut dyn Sequence) -> Step {
    panic::catch_unwind(AssertUnwindSafe(|| sequence.resume()))
        .unwrap_or_else(|payload| Step::Fault(WorkError::from_panic(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{from_fn, steps};

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_steps(count: &Arc<AtomicUsize>, n: usize) -> Box<dyn Sequence> {
        let steps_vec: Vec<Box<dyn FnOnce() + Send>> = (0..n)
            .map(|_| {
                let count = Arc::clone(count);
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            })
            .collect();
        Box::new(steps(steps_vec))
    }

    #[test]
    fn test_start_runs_first_step_then_one_per_pass() {
        let scheduler = CooperativeScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        scheduler.start(counting_steps(&count, 3), RunOwnership::Independent);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.live_count(), 1);

        let report = scheduler.advance();
        assert_eq!(report.resumed, 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        let report = scheduler.advance();
        assert_eq!(report.completed, 1);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.live_count(), 0);
    }

    #[test]
    fn test_owned_sequence_abandoned_when_lifetime_ends() {
        let scheduler = CooperativeScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let lifetime = Lifetime::new();

        scheduler.start(
            counting_steps(&count, 3),
            RunOwnership::Owned(lifetime.token()),
        );
        scheduler.start(counting_steps(&count, 3), RunOwnership::Independent);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        drop(lifetime);
        let report = scheduler.advance();
        assert_eq!(report.abandoned, 1);
        assert_eq!(report.resumed, 1);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.live_count(), 1);
    }

    #[test]
    fn test_start_with_dead_owner_is_dropped() {
        let scheduler = CooperativeScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let token = Lifetime::new().token();

        scheduler.start(counting_steps(&count, 2), RunOwnership::Owned(token));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.live_count(), 0);
    }

    #[test]
    fn test_panicking_sequence_faults_without_stopping_others() {
        let scheduler = CooperativeScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        let mut first = true;
        scheduler.start(
            Box::new(from_fn(move || {
                if std::mem::take(&mut first) {
                    Step::Suspend
                } else {
                    panic!("sequence blew up")
                }
            })),
            RunOwnership::Independent,
        );
        scheduler.start(counting_steps(&count, 2), RunOwnership::Independent);

        let report = scheduler.advance();
        assert_eq!(report.faulted, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_explicit_fault_step() {
        let scheduler = CooperativeScheduler::new();
        scheduler.start(
            Box::new(from_fn(|| Step::Suspend)),
            RunOwnership::Independent,
        );
        let mut fail_next = false;
        scheduler.start(
            Box::new(from_fn(move || {
                if fail_next {
                    Step::Fault(WorkError::failed("resource missing"))
                } else {
                    fail_next = true;
                    Step::Suspend
                }
            })),
            RunOwnership::Independent,
        );

        let report = scheduler.advance();
        assert_eq!(report.faulted, 1);
        assert_eq!(scheduler.live_count(), 1);
    }
}
