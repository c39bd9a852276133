//! Global host state
//!
//! The main thread is recorded once during host startup. Access is
//! thread-safe via OnceLock.

use std::sync::OnceLock;
use std::thread::ThreadId;

use crate::error::HostError;

/// Global host state recorded at startup
#[derive(Debug)]
pub struct HostGlobals {
    /// Main thread ID for thread safety checks
    pub main_thread_id: ThreadId,

    /// Host name for diagnostics
    pub name: String,
}

/// Global host state storage
static HOST: OnceLock<HostGlobals> = OnceLock::new();

/// Initialize host globals
///
/// Called once from the main thread during host startup.
pub fn init_host(globals: HostGlobals) -> Result<(), HostError> {
    let name = globals.name.clone();
    HOST.set(globals)
        .map_err(|_| HostError::AlreadyInitialized)?;
    tracing::info!("Host '{}' initialized", name);
    Ok(())
}

/// Get host globals
pub fn host() -> Result<&'static HostGlobals, HostError> {
    HOST.get().ok_or(HostError::NotInitialized)
}

/// Try to get host globals without an error
pub fn try_host() -> Option<&'static HostGlobals> {
    HOST.get()
}

/// Check if host is initialized
pub fn is_host_initialized() -> bool {
    HOST.get().is_some()
}

/// Check if current thread is the main host thread
///
/// Returns `None` when the host has not been initialized yet.
pub fn is_main_thread() -> Option<bool> {
    HOST.get()
        .map(|g| std::thread::current().id() == g.main_thread_id)
}

impl HostGlobals {
    /// Create new HostGlobals bound to the calling thread
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            main_thread_id: std::thread::current().id(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_init_once() {
        // Single test touches the global so ordering is deterministic
        let _ = init_host(HostGlobals::new("test-host"));
        assert!(is_host_initialized());
        assert_eq!(is_main_thread(), Some(true));
        assert_eq!(host().unwrap().name, "test-host");

        let second = init_host(HostGlobals::new("other"));
        assert!(matches!(second, Err(HostError::AlreadyInitialized)));

        let off_main = std::thread::spawn(is_main_thread).join().unwrap();
        assert_eq!(off_main, Some(false));
    }
}
