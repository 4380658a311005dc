//! Error types for the service directory

use thiserror::Error;

use stream_core::ServiceId;

/// Result type for directory operations
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Service directory errors
#[derive(Error, Debug, Clone)]
pub enum DirectoryError {
    /// No service is registered under this identifier
    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceId),

    /// Listing fields rejected by validation
    #[error("Invalid service listing: {0}")]
    InvalidService(String),

    /// Caller does not own the listing it tried to change
    #[error("Unauthorized provider: {0}")]
    UnauthorizedProvider(String),

    /// Listing exists but is not accepting streams
    #[error("Service is inactive: {0}")]
    InactiveService(ServiceId),
}
