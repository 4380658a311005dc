//! Boundary ports
//!
//! The engine moves value and reports stream starts through trait objects
//! supplied at startup. Port calls happen inside the engine's serialized
//! critical section, so implementations must be synchronous and must not
//! call back into the engine.

use crate::error::Result;
use crate::types::{AccountId, Asset, ServiceId, StreamId};

/// A single leg of a grouped payout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    /// Receiving account
    pub to: AccountId,

    /// Amount in base units
    pub amount: u128,
}

/// Moves value between external accounts and engine custody
///
/// Every method is all-or-nothing: on `Err`, no balance anywhere has
/// changed. The engine relies on this to roll its own state back cleanly.
pub trait TransferPort: Send + Sync {
    /// Pull `amount` of `asset` from `from` into engine custody
    fn transfer_in(&self, asset: &Asset, from: &AccountId, amount: u128) -> Result<()>;

    /// Pay `amount` of `asset` from engine custody to `to`
    fn transfer_out(&self, asset: &Asset, to: &AccountId, amount: u128) -> Result<()>;

    /// Pay several legs from engine custody as one unit
    ///
    /// Either every leg lands or none does. Zero-amount legs are skipped.
    fn transfer_out_batch(&self, asset: &Asset, payouts: &[Payout]) -> Result<()>;
}

/// Receives stream-start notifications for listed services
pub trait DirectoryPort: Send + Sync {
    /// A stream paying for `service_id` was opened
    fn record_stream(&self, service_id: ServiceId, stream_id: StreamId) -> Result<()>;
}
