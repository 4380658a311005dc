//! Protocol fee policy
//!
//! Fees are charged in basis points on provider payouts, floor-rounded, and
//! hard-capped at [`MAX_FEE_BPS`]. The cap is a protocol constant, not
//! configuration: no deployment may exceed 1%.

use crate::error::{Error, Result};

/// Hard upper bound on the protocol fee rate, in basis points (1%)
pub const MAX_FEE_BPS: u16 = 100;

/// Divisor turning basis points into a fraction
const BPS_DENOMINATOR: u128 = 10_000;

/// Current protocol fee rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    bps: u16,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { bps: 0 }
    }
}

impl FeePolicy {
    /// Create a policy, rejecting rates above the cap
    pub fn new(bps: u16) -> Result<Self> {
        if bps > MAX_FEE_BPS {
            return Err(Error::ExcessiveProtocolFee(bps));
        }
        Ok(Self { bps })
    }

    /// Current rate in basis points
    pub fn bps(&self) -> u16 {
        self.bps
    }

    /// Replace the rate, returning the previous one
    pub fn set(&mut self, bps: u16) -> Result<u16> {
        if bps > MAX_FEE_BPS {
            return Err(Error::ExcessiveProtocolFee(bps));
        }
        let old = self.bps;
        self.bps = bps;
        Ok(old)
    }

    /// Fee due on a payout, floor-rounded
    ///
    /// Exact for the full u128 domain: the quotient/remainder split keeps
    /// every intermediate product below `amount`, so nothing can overflow
    /// while the result still equals `floor(amount * bps / 10_000)`.
    pub fn fee_for(&self, amount: u128) -> u128 {
        let bps = u128::from(self.bps);
        (amount / BPS_DENOMINATOR) * bps + (amount % BPS_DENOMINATOR) * bps / BPS_DENOMINATOR
    }
}
