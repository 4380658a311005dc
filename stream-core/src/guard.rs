//! Request validation and authorization
//!
//! Stateless checks applied before any operation touches ledger state.
//! Each failure maps to one named error kind so callers can tell exactly
//! which rule rejected them.

use crate::error::{Error, Result};
use crate::types::{AccountId, Stream, StreamId, StreamRequest};

/// Validate the parameters of an open request
pub fn validate_open(request: &StreamRequest) -> Result<()> {
    if request.payer.is_empty() {
        return Err(Error::Unauthorized("payer identity is empty".to_string()));
    }
    if request.provider.is_empty() {
        return Err(Error::InvalidProvider(
            "provider identity is empty".to_string(),
        ));
    }
    if request.provider == request.payer {
        return Err(Error::InvalidProvider(format!(
            "provider must differ from payer: {}",
            request.provider
        )));
    }
    if request.asset.is_empty() {
        return Err(Error::InvalidToken("asset identifier is empty".to_string()));
    }
    if request.rate_per_second == 0 {
        return Err(Error::InvalidRate("rate must be positive".to_string()));
    }
    if request.duration_seconds == 0 {
        return Err(Error::InvalidDuration(
            "duration must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Total locked at open: rate * duration, rejected on overflow
pub fn checked_total(rate_per_second: u128, duration_seconds: u64) -> Result<u128> {
    rate_per_second
        .checked_mul(u128::from(duration_seconds))
        .ok_or_else(|| {
            Error::InvalidAmount(format!(
                "rate {} * duration {} overflows",
                rate_per_second, duration_seconds
            ))
        })
}

/// Caller must be the stream's provider
pub fn require_provider(stream: &Stream, caller: &AccountId) -> Result<()> {
    if caller != &stream.provider {
        return Err(Error::Unauthorized(format!(
            "caller {} is not the stream provider",
            caller
        )));
    }
    Ok(())
}

/// Caller must be the stream's payer
pub fn require_payer(stream: &Stream, caller: &AccountId) -> Result<()> {
    if caller != &stream.payer {
        return Err(Error::Unauthorized(format!(
            "caller {} is not the stream payer",
            caller
        )));
    }
    Ok(())
}

/// Caller must be the protocol admin
pub fn require_admin(admin: &AccountId, caller: &AccountId) -> Result<()> {
    if caller.is_empty() || caller != admin {
        return Err(Error::Unauthorized(format!(
            "caller {} is not the protocol admin",
            caller
        )));
    }
    Ok(())
}

/// Stream must not have been stopped yet
pub fn require_not_stopped(id: StreamId, stream: &Stream) -> Result<()> {
    if stream.stopped {
        return Err(Error::StreamAlreadyStopped(id));
    }
    Ok(())
}

/// Sweep recipient must be a usable identity
pub fn validate_recipient(recipient: &AccountId) -> Result<()> {
    if recipient.is_empty() {
        return Err(Error::InvalidProvider(
            "sweep recipient identity is empty".to_string(),
        ));
    }
    Ok(())
}
