//! FlowRail Service Directory
//!
//! Providers publish service listings here: what they offer, which asset
//! they charge in, and the rate and duration bounds they accept. The
//! settlement engine notifies the directory when a stream referencing a
//! listing starts; nothing in the directory affects settlement correctness.
//!
//! The registry is an in-process collaborator: concurrently readable,
//! written to by providers managing their listings and by the engine's
//! stream-start notifications.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod registry;
pub mod types;

// Re-exports
pub use error::{DirectoryError, Result};
pub use registry::ServiceRegistry;
pub use types::{ServiceListing, ServiceRecord};
