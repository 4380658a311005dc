//! Service registry
//!
//! Concurrent listing store with a provider index. Providers register and
//! manage their own listings; the settlement engine reports stream starts
//! through the [`DirectoryPort`] implementation at the bottom.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};

use stream_core::port::DirectoryPort;
use stream_core::{AccountId, ServiceId, StreamId};

use crate::error::{DirectoryError, Result};
use crate::types::{ServiceListing, ServiceRecord};

/// Longest allowed service name
const MAX_NAME_CHARS: usize = 64;

/// Longest allowed service description
const MAX_DESCRIPTION_CHARS: usize = 256;

/// In-process service directory
///
/// Listings are keyed by a monotonically assigned [`ServiceId`] and indexed
/// by provider. Records are never removed.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<ServiceId, ServiceRecord>,
    by_provider: DashMap<AccountId, Vec<ServiceId>>,
    next_id: AtomicU64,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new listing, returning its assigned id
    pub fn register_service(
        &self,
        provider: &AccountId,
        listing: ServiceListing,
    ) -> Result<ServiceId> {
        if provider.is_empty() {
            return Err(DirectoryError::InvalidService(
                "provider identity is empty".to_string(),
            ));
        }
        validate_listing(&listing)?;

        let id = ServiceId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let record = ServiceRecord {
            id,
            provider: provider.clone(),
            name: listing.name,
            description: listing.description,
            asset: listing.asset,
            min_rate_per_second: listing.min_rate_per_second,
            max_rate_per_second: listing.max_rate_per_second,
            max_duration_seconds: listing.max_duration_seconds,
            active: true,
            streams_started: 0,
            registered_at: now,
            updated_at: now,
        };

        info!(service_id = %id, %provider, name = %record.name, "service registered");
        self.services.insert(id, record);
        self.by_provider
            .entry(provider.clone())
            .or_default()
            .push(id);

        Ok(id)
    }

    /// Replace a listing's advertised fields
    ///
    /// Only the owning provider may update. Identity, activation state, and
    /// the stream counter are untouched.
    pub fn update_service(
        &self,
        id: ServiceId,
        caller: &AccountId,
        listing: ServiceListing,
    ) -> Result<()> {
        validate_listing(&listing)?;

        let mut record = self
            .services
            .get_mut(&id)
            .ok_or(DirectoryError::ServiceNotFound(id))?;
        require_owner(&record, caller)?;

        record.apply(listing);
        info!(service_id = %id, %caller, "service updated");
        Ok(())
    }

    /// Activate or deactivate a listing
    ///
    /// Deactivation hides the listing from discovery and makes stream-start
    /// notifications fail; the record itself is permanent.
    pub fn set_service_active(
        &self,
        id: ServiceId,
        caller: &AccountId,
        active: bool,
    ) -> Result<()> {
        let mut record = self
            .services
            .get_mut(&id)
            .ok_or(DirectoryError::ServiceNotFound(id))?;
        require_owner(&record, caller)?;

        record.active = active;
        record.updated_at = Utc::now();
        info!(service_id = %id, active, "service activation changed");
        Ok(())
    }

    /// Look up a listing
    pub fn get_service(&self, id: ServiceId) -> Result<ServiceRecord> {
        self.services
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(DirectoryError::ServiceNotFound(id))
    }

    /// All listings owned by a provider, in registration order
    pub fn services_by_provider(&self, provider: &AccountId) -> Vec<ServiceRecord> {
        let Some(ids) = self.by_provider.get(provider) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.services.get(id).map(|r| r.value().clone()))
            .collect()
    }

    /// All listings currently accepting streams, in id order
    pub fn active_services(&self) -> Vec<ServiceRecord> {
        let mut listings: Vec<ServiceRecord> = self
            .services
            .iter()
            .filter(|r| r.active)
            .map(|r| r.value().clone())
            .collect();
        listings.sort_by_key(|r| r.id);
        listings
    }

    /// Number of listings ever registered
    pub fn service_count(&self) -> u64 {
        self.services.len() as u64
    }

    /// Count a stream opened against a listing
    ///
    /// This is the engine-facing notification. It fails for unknown or
    /// inactive listings; the engine treats either as advisory and keeps
    /// the stream.
    pub fn record_stream(&self, service_id: ServiceId, stream_id: StreamId) -> Result<()> {
        let mut record = self
            .services
            .get_mut(&service_id)
            .ok_or(DirectoryError::ServiceNotFound(service_id))?;
        if !record.active {
            return Err(DirectoryError::InactiveService(service_id));
        }

        record.streams_started += 1;
        debug!(
            %service_id,
            %stream_id,
            streams_started = record.streams_started,
            "stream recorded against service"
        );
        Ok(())
    }
}

impl DirectoryPort for ServiceRegistry {
    fn record_stream(&self, service_id: ServiceId, stream_id: StreamId) -> stream_core::Result<()> {
        ServiceRegistry::record_stream(self, service_id, stream_id)
            .map_err(|e| stream_core::Error::Directory(e.to_string()))
    }
}

fn require_owner(record: &ServiceRecord, caller: &AccountId) -> Result<()> {
    if caller != &record.provider {
        return Err(DirectoryError::UnauthorizedProvider(format!(
            "{} does not own service {}",
            caller, record.id
        )));
    }
    Ok(())
}

fn validate_listing(listing: &ServiceListing) -> Result<()> {
    let name_chars = listing.name.chars().count();
    if listing.name.trim().is_empty() || name_chars > MAX_NAME_CHARS {
        return Err(DirectoryError::InvalidService(format!(
            "name must be 1 to {} characters",
            MAX_NAME_CHARS
        )));
    }
    if listing.description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(DirectoryError::InvalidService(format!(
            "description exceeds {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    if listing.asset.is_empty() {
        return Err(DirectoryError::InvalidService(
            "asset identifier is empty".to_string(),
        ));
    }
    if listing.min_rate_per_second == 0 {
        return Err(DirectoryError::InvalidService(
            "minimum rate must be positive".to_string(),
        ));
    }
    if listing.min_rate_per_second > listing.max_rate_per_second {
        return Err(DirectoryError::InvalidService(format!(
            "minimum rate {} exceeds maximum rate {}",
            listing.min_rate_per_second, listing.max_rate_per_second
        )));
    }
    if listing.max_duration_seconds == 0 {
        return Err(DirectoryError::InvalidService(
            "maximum duration must be positive".to_string(),
        ));
    }
    Ok(())
}
