//! Core types for the settlement engine
//!
//! Amounts are integer base units (u128) of the stream's asset. All
//! arithmetic on them is checked or explicitly capped; values never wrap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier (payer, provider, or protocol admin)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identity carries no content
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset identifier for the value being streamed (token contract, ISO code)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Asset(String);

impl Asset {
    /// Create new asset ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier carries no content
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream identifier, assigned sequentially from zero and never reused
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct StreamId(u64);

impl StreamId {
    /// Create from a raw counter value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Service identifier assigned by the directory
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ServiceId(u64);

impl ServiceId {
    /// Create from a raw counter value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters for opening a stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Account funding the stream
    pub payer: AccountId,

    /// Account earning from the stream
    pub provider: AccountId,

    /// Asset the stream pays in
    pub asset: Asset,

    /// Payment rate in base units per second
    pub rate_per_second: u128,

    /// Stream length in seconds
    pub duration_seconds: u64,

    /// Directory listing this stream pays for, if any
    pub service_id: Option<ServiceId>,
}

/// A payment stream
///
/// The record is append-only in spirit: `withdrawn_amount` and `stopped` are
/// the only fields that change after creation, and `stopped` changes once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Account that locked the funds
    pub payer: AccountId,

    /// Account earning the funds
    pub provider: AccountId,

    /// Asset the stream pays in
    pub asset: Asset,

    /// Rate in base units per second
    pub rate_per_second: u128,

    /// Accrual clock start, seconds since Unix epoch
    pub start_time: u64,

    /// Accrual window length in seconds
    pub duration_seconds: u64,

    /// Total locked at open: rate * duration
    pub total_amount: u128,

    /// Sum of all amounts already paid out to the provider
    pub withdrawn_amount: u128,

    /// Set once by stop; a stopped stream accepts no further operations
    pub stopped: bool,

    /// Directory listing this stream pays for, if any
    pub service_id: Option<ServiceId>,

    /// Wall-clock creation time, for operators
    pub opened_at: DateTime<Utc>,
}

impl Stream {
    /// Last second at which value still accrues
    pub fn end_time(&self) -> u64 {
        self.start_time.saturating_add(self.duration_seconds)
    }

    /// Funds still held for this stream (not yet paid out)
    pub fn locked_remaining(&self) -> u128 {
        self.total_amount.saturating_sub(self.withdrawn_amount)
    }
}

/// Outcome of stopping a stream: how the remaining locked funds split
///
/// `provider_amount + payer_refund + fee` always equals the funds the
/// stream still held at the moment of the stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Net payout to the provider (earned minus prior withdrawals and fee)
    pub provider_amount: u128,

    /// Unearned remainder returned to the payer
    pub payer_refund: u128,

    /// Protocol fee retained from the provider's share
    pub fee: u128,
}
