//! tickdispatch Host - Environment and Global Storage
//!
//! This crate handles:
//! - The environment predicate the dispatcher consults at drain time
//! - Recording the main host thread for runtime checks
//!
//! # Thread Safety
//!
//! The main thread ID is stored once in [`globals::HostGlobals`] and queried
//! via [`is_main_thread()`].

pub mod environment;
pub mod error;
pub mod globals;

pub use environment::{HostEnvironment, HostMode, SharedEnvironment};
pub use error::HostError;
pub use globals::{host, init_host, is_host_initialized, is_main_thread, try_host, HostGlobals};
