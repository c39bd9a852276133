//! Host environment predicate
//!
//! The dispatcher consults the host at drain time to decide how suspendable
//! sequences are started. An editing host has no live simulation loop; a
//! playing host drives ticks continuously.

use std::sync::atomic::{AtomicBool, Ordering};

/// Execution mode reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Interactive/edit context with no live simulation
    Editing,
    /// Live running context
    Playing,
}

impl HostMode {
    /// Returns true for [`HostMode::Editing`]
    pub fn is_editing(self) -> bool {
        matches!(self, HostMode::Editing)
    }
}

/// Callbacks the dispatcher needs from its host
pub trait HostEnvironment: Send + Sync {
    /// Whether the host is in an interactive/edit context
    fn is_editing(&self) -> bool;

    /// Convenience accessor built on [`HostEnvironment::is_editing`]
    fn mode(&self) -> HostMode {
        if self.is_editing() {
            HostMode::Editing
        } else {
            HostMode::Playing
        }
    }

    /// Runtime integration hook, called each time a dispatcher is registered
    fn init_runtime(&self) {}

    /// Ask the host to keep the dispatcher alive across scene/context transitions
    ///
    /// Called at most once per dispatcher, on its first activation in a live host.
    fn retain_across_transitions(&self) {}
}

/// Host environment backed by an atomic flag
///
/// Used when the host pushes its mode in (C ABI, tests) instead of being
/// queried through a richer object model.
#[derive(Debug)]
pub struct SharedEnvironment {
    editing: AtomicBool,
    retained: AtomicBool,
}

impl SharedEnvironment {
    /// Create a new environment in the given mode
    pub fn new(mode: HostMode) -> Self {
        Self {
            editing: AtomicBool::new(mode.is_editing()),
            retained: AtomicBool::new(false),
        }
    }

    /// Switch between editing and playing
    pub fn set_mode(&self, mode: HostMode) {
        let previous = self.editing.swap(mode.is_editing(), Ordering::AcqRel);
        if previous != mode.is_editing() {
            tracing::debug!("Host mode changed to {:?}", mode);
        }
    }

    /// Whether the dispatcher asked to be retained across transitions
    pub fn is_retained(&self) -> bool {
        self.retained.load(Ordering::Acquire)
    }
}

impl Default for SharedEnvironment {
    fn default() -> Self {
        Self::new(HostMode::Playing)
    }
}

impl HostEnvironment for SharedEnvironment {
    fn is_editing(&self) -> bool {
        self.editing.load(Ordering::Acquire)
    }

    fn retain_across_transitions(&self) {
        self.retained.store(true, Ordering::Release);
        tracing::debug!("Dispatcher retained across transitions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_environment_mode_switch() {
        let env = SharedEnvironment::new(HostMode::Editing);
        assert!(env.is_editing());
        assert_eq!(env.mode(), HostMode::Editing);

        env.set_mode(HostMode::Playing);
        assert!(!env.is_editing());
        assert_eq!(env.mode(), HostMode::Playing);
    }

    #[test]
    fn test_retain_flag() {
        let env = SharedEnvironment::default();
        assert!(!env.is_retained());
        env.retain_across_transitions();
        assert!(env.is_retained());
    }
}
