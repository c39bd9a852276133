//! Suspendable multi-step sequences
//!
//! A sequence is a state machine resumed by a cooperative scheduler. Each
//! call to [`Sequence::resume`] runs one step and reports whether to suspend
//! until the next scheduler pass, finish, or fault.
//!
//! # Example
//!
//! ```ignore
//! use tickdispatch_core::sequence::{self, Step};
//!
//! // Three steps, two yield points
//! let seq = sequence::steps([
//!     Box::new(|| println!("load")) as Box<dyn FnOnce() + Send>,
//!     Box::new(|| println!("build")),
//!     Box::new(|| println!("attach")),
//! ]);
//!
//! // Hand-written state machine
//! let mut remaining = 3;
//! let seq = sequence::from_fn(move || {
//!     remaining -= 1;
//!     if remaining == 0 { Step::Done } else { Step::Suspend }
//! });
//! ```

mod scheduler;

use std::collections::VecDeque;

use crate::error::WorkError;

pub use scheduler::{
    AdvanceReport, CooperativeScheduler, Lifetime, LifetimeToken, RunOwnership, SequenceScheduler,
};

/// Result of resuming a sequence once
#[derive(Debug)]
pub enum Step {
    /// Yield to the scheduler and resume on a later pass
    Suspend,
    /// The sequence has finished
    Done,
    /// The sequence failed and will not be resumed again
    Fault(WorkError),
}

/// A unit of work that may span several scheduler passes
pub trait Sequence: Send + 'static {
    /// Run until the next yield point
    fn resume(&mut self) -> Step;
}

impl<S: Sequence + ?Sized> Sequence for Box<S> {
    fn resume(&mut self) -> Step {
        (**self).resume()
    }
}

/// Sequence driven by a closure returning [`Step`]
pub struct FromFn<F>(F);

impl<F> Sequence for FromFn<F>
where
    F: FnMut() -> Step + Send + 'static,
{
    fn resume(&mut self) -> Step {
        (self.0)()
    }
}

/// Build a sequence from a closure called once per resumption
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut() -> Step + Send + 'static,
{
    FromFn(f)
}

/// Single-step adapter around a plain action
pub struct Once<F>(Option<F>);

impl<F> Sequence for Once<F>
where
    F: FnOnce() + Send + 'static,
{
    fn resume(&mut self) -> Step {
        if let Some(action) = self.0.take() {
            action();
        }
        Step::Done
    }
}

/// Wrap an action so it runs as a one-step sequence
pub fn once<F>(action: F) -> Once<F>
where
    F: FnOnce() + Send + 'static,
{
    Once(Some(action))
}

/// Sequence running one closure per resumption, yielding between them
pub struct Steps {
    remaining: VecDeque<Box<dyn FnOnce() + Send + 'static>>,
}

impl Sequence for Steps {
    fn resume(&mut self) -> Step {
        if let Some(step) = self.remaining.pop_front() {
            step();
        }
        if self.remaining.is_empty() {
            Step::Done
        } else {
            Step::Suspend
        }
    }
}

/// Build a sequence that yields between each of `steps`
pub fn steps<I>(steps: I) -> Steps
where
    I: IntoIterator<Item = Box<dyn FnOnce() + Send + 'static>>,
{
    Steps {
        remaining: steps.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    #[test]
    fn test_once_runs_action_and_finishes() {
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let mut seq = once(move || *counter.lock() += 1);

        assert!(matches!(seq.resume(), Step::Done));
        assert!(matches!(seq.resume(), Step::Done));
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn test_steps_yield_between_closures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let step = |label: &'static str| -> Box<dyn FnOnce() + Send> {
            let log = Arc::clone(&log);
            Box::new(move || log.lock().push(label))
        };
        let mut seq = steps([step("one"), step("two"), step("three")]);

        assert!(matches!(seq.resume(), Step::Suspend));
        assert_eq!(*log.lock(), vec!["one"]);
        assert!(matches!(seq.resume(), Step::Suspend));
        assert!(matches!(seq.resume(), Step::Done));
        assert_eq!(*log.lock(), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_empty_steps_done_immediately() {
        let mut seq = steps(Vec::new());
        assert!(matches!(seq.resume(), Step::Done));
    }
}
