//! Stream ledger: owned state and operation logic
//!
//! This module holds the engine's entire mutable state and implements every
//! operation against it. All methods take `&mut self` and run on the single
//! writer task, so each operation observes and commits a consistent snapshot
//! with nothing interleaved.
//!
//! Operations that move value mutate state first, then call the transfer
//! port, and roll the mutation back if the port fails. The port is the only
//! thing that can fail after validation, so a rolled-back operation leaves
//! state exactly as it found it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::accrual;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventKind, EventSink};
use crate::fees::FeePolicy;
use crate::guard;
use crate::metrics::Metrics;
use crate::port::{DirectoryPort, Payout, TransferPort};
use crate::types::{AccountId, Asset, Settlement, Stream, StreamId, StreamRequest};

/// All mutable engine state
///
/// Stream records are append-only: ids are assigned from a counter that only
/// advances on successful opens, and records are never removed, so an id
/// that ever named a stream names it forever.
struct LedgerState {
    streams: BTreeMap<StreamId, Stream>,
    next_stream_id: u64,
    fee_balances: HashMap<Asset, u128>,
}

impl LedgerState {
    fn new() -> Self {
        Self {
            streams: BTreeMap::new(),
            next_stream_id: 0,
            fee_balances: HashMap::new(),
        }
    }

    fn stream(&self, id: StreamId) -> Result<&Stream> {
        self.streams.get(&id).ok_or(Error::StreamNotFound(id))
    }

    fn stream_mut(&mut self, id: StreamId) -> Result<&mut Stream> {
        self.streams.get_mut(&id).ok_or(Error::StreamNotFound(id))
    }

    fn credit_fee(&mut self, asset: &Asset, amount: u128) {
        if amount == 0 {
            return;
        }
        let balance = self.fee_balances.entry(asset.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    fn debit_fee(&mut self, asset: &Asset, amount: u128) {
        if amount == 0 {
            return;
        }
        if let Some(balance) = self.fee_balances.get_mut(asset) {
            *balance = balance.saturating_sub(amount);
            if *balance == 0 {
                self.fee_balances.remove(asset);
            }
        }
    }
}

/// The settlement engine's operation core
///
/// Not `Sync` on purpose: exactly one task owns it and serializes every
/// operation. Concurrent access goes through [`crate::EngineHandle`].
pub struct StreamLedger {
    state: LedgerState,
    fee_policy: FeePolicy,
    admin: AccountId,
    transfer: Arc<dyn TransferPort>,
    directory: Option<Arc<dyn DirectoryPort>>,
    clock: Arc<dyn Clock>,
    events: EventSink,
    metrics: Metrics,
}

impl StreamLedger {
    /// Create a ledger with no streams and empty fee balances
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        admin: AccountId,
        fee_policy: FeePolicy,
        transfer: Arc<dyn TransferPort>,
        directory: Option<Arc<dyn DirectoryPort>>,
        clock: Arc<dyn Clock>,
        events: EventSink,
        metrics: Metrics,
    ) -> Self {
        Self {
            state: LedgerState::new(),
            fee_policy,
            admin,
            transfer,
            directory,
            clock,
            events,
            metrics,
        }
    }

    /// Open a stream, locking `rate * duration` upfront
    ///
    /// The caller is the payer. The funding transfer runs before any state
    /// changes: if it fails, no stream exists and no id was consumed.
    pub fn open_stream(&mut self, request: StreamRequest) -> Result<StreamId> {
        let result = self.execute_open(request);
        if result.is_err() {
            self.metrics.record_rejection();
        }
        result
    }

    fn execute_open(&mut self, request: StreamRequest) -> Result<StreamId> {
        guard::validate_open(&request)?;
        let total_amount =
            guard::checked_total(request.rate_per_second, request.duration_seconds)?;

        self.transfer
            .transfer_in(&request.asset, &request.payer, total_amount)?;

        let id = StreamId::new(self.state.next_stream_id);
        let start_time = self.clock.unix_now();
        let stream = Stream {
            payer: request.payer.clone(),
            provider: request.provider.clone(),
            asset: request.asset.clone(),
            rate_per_second: request.rate_per_second,
            start_time,
            duration_seconds: request.duration_seconds,
            total_amount,
            withdrawn_amount: 0,
            stopped: false,
            service_id: request.service_id,
            opened_at: Utc::now(),
        };
        self.state.streams.insert(id, stream);
        self.state.next_stream_id += 1;

        self.metrics.record_open(total_amount);
        self.events.emit(EventKind::StreamStarted {
            stream_id: id,
            payer: request.payer,
            provider: request.provider,
            asset: request.asset,
            rate_per_second: request.rate_per_second,
            duration_seconds: request.duration_seconds,
            total_amount,
            service_id: request.service_id,
        });

        // Directory bookkeeping is advisory; a failure there must not undo
        // a committed stream.
        if let (Some(directory), Some(service_id)) = (&self.directory, request.service_id) {
            if let Err(err) = directory.record_stream(service_id, id) {
                warn!(%service_id, stream_id = %id, error = %err, "directory notification failed");
            }
        }

        Ok(id)
    }

    /// Pay out everything earned but not yet withdrawn to the provider
    ///
    /// The caller must be the stream's provider. Returns the net amount
    /// paid after the protocol fee. A stopped stream has nothing available
    /// (stop finalizes `withdrawn_amount`), so the call fails
    /// `InsufficientEarned` rather than a dedicated stopped error.
    pub fn withdraw(&mut self, caller: &AccountId, id: StreamId) -> Result<u128> {
        let result = self.execute_withdraw(caller, id);
        if result.is_err() {
            self.metrics.record_rejection();
        }
        result
    }

    fn execute_withdraw(&mut self, caller: &AccountId, id: StreamId) -> Result<u128> {
        let stream = self.state.stream(id)?;
        guard::require_provider(stream, caller)?;

        let now = self.clock.unix_now();
        let available = accrual::available(stream, now);
        if available == 0 {
            return Err(Error::InsufficientEarned(format!(
                "stream {}: nothing earned and unwithdrawn",
                id
            )));
        }

        let fee = self.fee_policy.fee_for(available);
        let net_amount = available - fee;
        let asset = stream.asset.clone();
        let provider = stream.provider.clone();

        // Commit, then pay. The record must already show the withdrawal
        // when the port runs, so nothing observed mid-operation can pay
        // the same funds twice.
        let stream = self.state.stream_mut(id)?;
        stream.withdrawn_amount = stream.withdrawn_amount.saturating_add(available);
        self.state.credit_fee(&asset, fee);

        if let Err(err) = self.transfer.transfer_out(&asset, &provider, net_amount) {
            if let Ok(stream) = self.state.stream_mut(id) {
                stream.withdrawn_amount = stream.withdrawn_amount.saturating_sub(available);
            }
            self.state.debit_fee(&asset, fee);
            return Err(err);
        }

        self.metrics.record_withdraw(net_amount, fee);
        self.events.emit(EventKind::StreamWithdrawn {
            stream_id: id,
            provider,
            net_amount,
            fee,
        });

        Ok(net_amount)
    }

    /// Stop a stream early and settle it
    ///
    /// The caller must be the stream's payer. Everything earned but not yet
    /// withdrawn goes to the provider (minus fee), the unearned remainder
    /// returns to the payer, and both payouts land in one port call.
    pub fn stop_stream(&mut self, caller: &AccountId, id: StreamId) -> Result<Settlement> {
        let result = self.execute_stop(caller, id);
        if result.is_err() {
            self.metrics.record_rejection();
        }
        result
    }

    fn execute_stop(&mut self, caller: &AccountId, id: StreamId) -> Result<Settlement> {
        let stream = self.state.stream(id)?;
        guard::require_payer(stream, caller)?;
        guard::require_not_stopped(id, stream)?;

        let now = self.clock.unix_now();
        let total_earned = accrual::earned(stream, now);
        let prior_withdrawn = stream.withdrawn_amount;
        let owed_gross = total_earned.saturating_sub(prior_withdrawn);
        let payer_refund = stream.total_amount.saturating_sub(total_earned);
        let fee = self.fee_policy.fee_for(owed_gross);
        let provider_amount = owed_gross - fee;

        let asset = stream.asset.clone();
        let provider = stream.provider.clone();
        let payer = stream.payer.clone();

        let stream = self.state.stream_mut(id)?;
        stream.stopped = true;
        stream.withdrawn_amount = total_earned;
        self.state.credit_fee(&asset, fee);

        let payouts = [
            Payout {
                to: provider,
                amount: provider_amount,
            },
            Payout {
                to: payer.clone(),
                amount: payer_refund,
            },
        ];
        if let Err(err) = self.transfer.transfer_out_batch(&asset, &payouts) {
            if let Ok(stream) = self.state.stream_mut(id) {
                stream.stopped = false;
                stream.withdrawn_amount = prior_withdrawn;
            }
            self.state.debit_fee(&asset, fee);
            return Err(err);
        }

        let settlement = Settlement {
            provider_amount,
            payer_refund,
            fee,
        };
        self.metrics
            .record_stop(provider_amount, payer_refund, fee);
        self.events.emit(EventKind::StreamStopped {
            stream_id: id,
            payer,
            provider_amount,
            payer_refund,
            fee,
        });

        Ok(settlement)
    }

    /// Change the protocol fee rate, returning the previous rate
    ///
    /// Admin only. The new rate applies to payouts settled after this call;
    /// already-settled amounts are untouched.
    pub fn set_fee(&mut self, caller: &AccountId, new_bps: u16) -> Result<u16> {
        let result = self.execute_set_fee(caller, new_bps);
        if result.is_err() {
            self.metrics.record_rejection();
        }
        result
    }

    fn execute_set_fee(&mut self, caller: &AccountId, new_bps: u16) -> Result<u16> {
        guard::require_admin(&self.admin, caller)?;
        let old_bps = self.fee_policy.set(new_bps)?;
        self.events.emit(EventKind::FeeUpdated { old_bps, new_bps });
        Ok(old_bps)
    }

    /// Withdraw the entire accrued fee balance of one asset
    ///
    /// Admin only. The balance zeroes and pays out as one unit; on port
    /// failure it is restored in full.
    pub fn sweep_fees(
        &mut self,
        caller: &AccountId,
        asset: &Asset,
        recipient: &AccountId,
    ) -> Result<u128> {
        let result = self.execute_sweep(caller, asset, recipient);
        if result.is_err() {
            self.metrics.record_rejection();
        }
        result
    }

    fn execute_sweep(
        &mut self,
        caller: &AccountId,
        asset: &Asset,
        recipient: &AccountId,
    ) -> Result<u128> {
        guard::require_admin(&self.admin, caller)?;
        guard::validate_recipient(recipient)?;

        let amount = match self.state.fee_balances.remove(asset) {
            Some(balance) if balance > 0 => balance,
            _ => return Err(Error::NoFeesToWithdraw(asset.clone())),
        };

        if let Err(err) = self.transfer.transfer_out(asset, recipient, amount) {
            self.state.credit_fee(asset, amount);
            return Err(err);
        }

        self.metrics.record_sweep();
        self.events.emit(EventKind::FeesSwept {
            asset: asset.clone(),
            recipient: recipient.clone(),
            amount,
        });

        Ok(amount)
    }

    /// Look up a stream record
    pub fn get_stream(&self, id: StreamId) -> Result<Stream> {
        self.state.stream(id).cloned()
    }

    /// Total value earned by the provider so far
    pub fn earned(&self, id: StreamId) -> Result<u128> {
        let stream = self.state.stream(id)?;
        Ok(accrual::earned(stream, self.clock.unix_now()))
    }

    /// Earned value the provider has not yet withdrawn
    pub fn withdrawable(&self, id: StreamId) -> Result<u128> {
        let stream = self.state.stream(id)?;
        Ok(accrual::available(stream, self.clock.unix_now()))
    }

    /// Seconds of accrual left; zero once stopped or expired
    pub fn remaining_time(&self, id: StreamId) -> Result<u64> {
        let stream = self.state.stream(id)?;
        Ok(accrual::remaining_seconds(stream, self.clock.unix_now()))
    }

    /// Number of streams ever created
    pub fn stream_count(&self) -> u64 {
        self.state.streams.len() as u64
    }

    /// Accrued, unswept fees for an asset
    pub fn fee_balance(&self, asset: &Asset) -> u128 {
        self.state.fee_balances.get(asset).copied().unwrap_or(0)
    }

    /// Current fee rate in basis points
    pub fn fee_bps(&self) -> u16 {
        self.fee_policy.bps()
    }

    /// Broadcast handle for event subscriptions
    pub fn event_sender(&self) -> tokio::sync::broadcast::Sender<EngineEvent> {
        self.events.sender()
    }

    /// Metrics collector shared with this ledger
    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }
}
