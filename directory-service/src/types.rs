//! Directory records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stream_core::{AccountId, Asset, ServiceId};

/// Listing fields a provider submits when registering or updating a service
///
/// Rates and duration are advertised constraints for payers choosing a
/// service; the settlement engine never reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceListing {
    /// Display name, 1 to 64 characters
    pub name: String,

    /// Free-form description, up to 256 characters
    pub description: String,

    /// Asset the service charges in
    pub asset: Asset,

    /// Lowest per-second rate the provider accepts
    pub min_rate_per_second: u128,

    /// Highest per-second rate the provider accepts
    pub max_rate_per_second: u128,

    /// Longest session the provider accepts, in seconds
    pub max_duration_seconds: u64,
}

/// A registered service
///
/// Records are permanent: deactivation hides a listing from discovery but
/// never deletes it, and its id is never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Directory-assigned identifier, sequential from zero
    pub id: ServiceId,

    /// Account that owns and earns from this service
    pub provider: AccountId,

    /// Display name
    pub name: String,

    /// Free-form description
    pub description: String,

    /// Asset the service charges in
    pub asset: Asset,

    /// Lowest per-second rate the provider accepts
    pub min_rate_per_second: u128,

    /// Highest per-second rate the provider accepts
    pub max_rate_per_second: u128,

    /// Longest session the provider accepts, in seconds
    pub max_duration_seconds: u64,

    /// Whether the listing is currently accepting streams
    pub active: bool,

    /// Streams the engine has reported against this listing
    pub streams_started: u64,

    /// When the listing was first registered
    pub registered_at: DateTime<Utc>,

    /// When the listing was last changed
    pub updated_at: DateTime<Utc>,
}

impl ServiceRecord {
    /// Apply updated listing fields, keeping identity and counters
    pub(crate) fn apply(&mut self, listing: ServiceListing) {
        self.name = listing.name;
        self.description = listing.description;
        self.asset = listing.asset;
        self.min_rate_per_second = listing.min_rate_per_second;
        self.max_rate_per_second = listing.max_rate_per_second;
        self.max_duration_seconds = listing.max_duration_seconds;
        self.updated_at = Utc::now();
    }
}
