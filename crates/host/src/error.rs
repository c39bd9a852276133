//! Error types for host integration

/// Error type for host global operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Host globals were already recorded
    #[error("Host already initialized")]
    AlreadyInitialized,

    /// Host globals were queried before `init_host`
    #[error("Host not initialized")]
    NotInitialized,
}
