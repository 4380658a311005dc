//! Error types for the settlement engine

use thiserror::Error;

use crate::types::{Asset, StreamId};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement engine errors
///
/// Every failed operation leaves engine state untouched. Variants carry
/// enough context to diagnose a rejection without consulting logs.
#[derive(Error, Debug)]
pub enum Error {
    /// Provider identity rejected (empty, or equal to the payer)
    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    /// Asset identifier rejected
    #[error("Invalid asset: {0}")]
    InvalidToken(String),

    /// Rate must be a positive amount per second
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// Duration must be a positive number of seconds
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Committed total rejected (zero or out of range)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// No stream exists under this identifier
    #[error("Stream not found: {0}")]
    StreamNotFound(StreamId),

    /// Stream was already stopped
    #[error("Stream already stopped: {0}")]
    StreamAlreadyStopped(StreamId),

    /// Caller is not permitted to perform this operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Withdrawal exceeds the earned, not-yet-withdrawn balance
    #[error("Insufficient earned balance: {0}")]
    InsufficientEarned(String),

    /// Requested fee rate exceeds the protocol cap
    #[error("Excessive protocol fee: {0} basis points")]
    ExcessiveProtocolFee(u16),

    /// Fee sweep requested for an asset with a zero balance
    #[error("No fees to withdraw for asset: {0}")]
    NoFeesToWithdraw(Asset),

    /// Value transfer port refused or failed a movement
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Service directory error
    #[error("Directory error: {0}")]
    Directory(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
