//! Accrual arithmetic
//!
//! Pure functions from a stream record and a point in time to amounts.
//! Everything here is total: out-of-range inputs clamp instead of wrapping,
//! and earned value can never exceed the locked total.

use crate::types::Stream;

/// Value earned by the provider at `now`, in base units
///
/// Accrual is linear in elapsed whole seconds, starts at `start_time`, and
/// caps at `duration_seconds`. A stopped stream's earnings are frozen at the
/// settled amount it was stopped with.
pub fn earned(stream: &Stream, now: u64) -> u128 {
    if stream.stopped {
        // stop() settles the stream and records the final earned value
        // in withdrawn_amount; nothing accrues past that point.
        return stream.withdrawn_amount;
    }

    let elapsed = now
        .saturating_sub(stream.start_time)
        .min(stream.duration_seconds);

    u128::from(elapsed)
        .saturating_mul(stream.rate_per_second)
        .min(stream.total_amount)
}

/// Earned value not yet withdrawn, in base units
pub fn available(stream: &Stream, now: u64) -> u128 {
    earned(stream, now).saturating_sub(stream.withdrawn_amount)
}

/// Seconds of accrual left before the stream's window closes
pub fn remaining_seconds(stream: &Stream, now: u64) -> u64 {
    if stream.stopped {
        return 0;
    }
    stream
        .end_time()
        .saturating_sub(now)
        .min(stream.duration_seconds)
}
