//! Main thread work queue and completion handles
//!
//! Background threads queue work that executes on the main host thread.
//! The queue is drained once per tick by the dispatcher.

pub mod completion;
pub mod queue;

pub use completion::{completion, CompletionHandle, CompletionState, Resolver};
pub use queue::{DrainReport, DrainStrategy, FaultPolicy, PendingWork, WorkItem};
