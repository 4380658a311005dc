//! Property-based tests for settlement invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Value conservation: payouts + refund + fees == locked total
//! - Monotonic accrual: earned value never decreases, caps at the total
//! - Bounded fees: fee is an exact floor and never exceeds the amount
//! - Rollback neutrality: a failed port call leaves state bit-identical

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use stream_core::events::EventSink;
use stream_core::{
    AccountId, Asset, CustodyVault, Error, FeePolicy, ManualClock, Metrics, Payout, StreamId,
    StreamLedger, StreamRequest, TransferPort,
};

/// Port wrapper whose outbound legs can be switched off
struct RefusingPort {
    inner: Arc<CustodyVault>,
    refuse_outbound: AtomicBool,
}

impl RefusingPort {
    fn new(inner: Arc<CustodyVault>) -> Self {
        Self {
            inner,
            refuse_outbound: AtomicBool::new(false),
        }
    }

    fn refuse_outbound(&self, refuse: bool) {
        self.refuse_outbound.store(refuse, Ordering::SeqCst);
    }
}

impl TransferPort for RefusingPort {
    fn transfer_in(&self, asset: &Asset, from: &AccountId, amount: u128) -> stream_core::Result<()> {
        self.inner.transfer_in(asset, from, amount)
    }

    fn transfer_out(&self, asset: &Asset, to: &AccountId, amount: u128) -> stream_core::Result<()> {
        if self.refuse_outbound.load(Ordering::SeqCst) {
            return Err(Error::Transfer("outbound rail refused".to_string()));
        }
        self.inner.transfer_out(asset, to, amount)
    }

    fn transfer_out_batch(&self, asset: &Asset, payouts: &[Payout]) -> stream_core::Result<()> {
        if self.refuse_outbound.load(Ordering::SeqCst) {
            return Err(Error::Transfer("outbound rail refused".to_string()));
        }
        self.inner.transfer_out_batch(asset, payouts)
    }
}

struct Harness {
    ledger: StreamLedger,
    clock: Arc<ManualClock>,
    vault: Arc<CustodyVault>,
    port: Arc<RefusingPort>,
    asset: Asset,
    payer: AccountId,
    provider: AccountId,
    admin: AccountId,
    treasury: AccountId,
}

/// Build a ledger whose payer holds exactly `funds`
fn harness(fee_bps: u16, funds: u128) -> Harness {
    let asset = Asset::new("USDC");
    let payer = AccountId::new("payer-1");
    let provider = AccountId::new("provider-1");
    let admin = AccountId::new("admin-1");
    let treasury = AccountId::new("treasury");

    let vault = Arc::new(CustodyVault::new(AccountId::new("custody")));
    vault.mint(&asset, &payer, funds);
    let port = Arc::new(RefusingPort::new(vault.clone()));
    let clock = Arc::new(ManualClock::new(0));

    let ledger = StreamLedger::new(
        admin.clone(),
        FeePolicy::new(fee_bps).unwrap(),
        port.clone(),
        None,
        clock.clone(),
        EventSink::new(1024),
        Metrics::new().unwrap(),
    );

    Harness {
        ledger,
        clock,
        vault,
        port,
        asset,
        payer,
        provider,
        admin,
        treasury,
    }
}

fn open(h: &mut Harness, rate: u128, duration: u64) -> StreamId {
    h.ledger
        .open_stream(StreamRequest {
            payer: h.payer.clone(),
            provider: h.provider.clone(),
            asset: h.asset.clone(),
            rate_per_second: rate,
            duration_seconds: duration,
            service_id: None,
        })
        .unwrap()
}

/// One step of a randomly scheduled stream lifetime
#[derive(Debug, Clone)]
enum Action {
    Advance(u64),
    Withdraw,
    Stop,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (1u64..3_600).prop_map(Action::Advance),
        2 => Just(Action::Withdraw),
        1 => Just(Action::Stop),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: whatever the schedule of withdrawals, stops, and clock
    /// jumps, every base unit the payer locked is recovered by exactly one
    /// of payer, provider, or fee recipient.
    #[test]
    fn prop_value_conserved_under_any_schedule(
        rate in 1u128..1_000_000u128,
        duration in 1u64..86_400u64,
        fee_bps in 0u16..=100u16,
        actions in prop::collection::vec(action_strategy(), 1..40),
    ) {
        let total = rate * u128::from(duration);
        let mut h = harness(fee_bps, total);
        let id = open(&mut h, rate, duration);
        let mut stopped = false;

        for action in actions {
            match action {
                Action::Advance(seconds) => h.clock.advance(seconds),
                Action::Withdraw => {
                    let available = h.ledger.withdrawable(id).unwrap();
                    match h.ledger.withdraw(&h.provider, id) {
                        Ok(net) => prop_assert!(net <= available),
                        Err(Error::InsufficientEarned(_)) => prop_assert_eq!(available, 0),
                        Err(other) => return Err(TestCaseError::fail(other.to_string())),
                    }
                }
                Action::Stop => {
                    match h.ledger.stop_stream(&h.payer, id) {
                        Ok(_) => stopped = true,
                        Err(Error::StreamAlreadyStopped(_)) => {}
                        Err(other) => return Err(TestCaseError::fail(other.to_string())),
                    }
                }
            }

            let stream = h.ledger.get_stream(id).unwrap();
            let earned = h.ledger.earned(id).unwrap();
            prop_assert!(earned <= stream.total_amount);
            prop_assert!(stream.withdrawn_amount <= earned);
        }

        if !stopped {
            h.ledger.stop_stream(&h.payer, id).unwrap();
        }
        let fees = h.ledger.fee_balance(&h.asset);
        if fees > 0 {
            h.ledger.sweep_fees(&h.admin, &h.asset, &h.treasury).unwrap();
        }

        let recovered = h.vault.balance(&h.asset, &h.payer)
            + h.vault.balance(&h.asset, &h.provider)
            + h.vault.balance(&h.asset, &h.treasury);
        prop_assert_eq!(recovered, total);
        prop_assert_eq!(h.vault.custody_balance(&h.asset), 0);
    }

    /// Property: earned value never decreases as the clock advances, and
    /// once the window closes it equals the locked total exactly.
    #[test]
    fn prop_accrual_monotonic_and_capped(
        rate in 1u128..1_000_000u128,
        duration in 1u64..86_400u64,
        jumps in prop::collection::vec(1u64..10_000u64, 1..32),
    ) {
        let total = rate * u128::from(duration);
        let mut h = harness(0, total);
        let id = open(&mut h, rate, duration);

        let mut previous = 0u128;
        for jump in jumps {
            h.clock.advance(jump);
            let earned = h.ledger.earned(id).unwrap();
            prop_assert!(earned >= previous);
            prop_assert!(earned <= total);
            previous = earned;
        }

        h.clock.set(u64::from(u32::MAX));
        prop_assert_eq!(h.ledger.earned(id).unwrap(), total);
    }

    /// Property: the fee is floor(amount * bps / 10_000), computed without
    /// overflow anywhere in u128, and never exceeds the amount.
    #[test]
    fn prop_fee_exact_floor_and_bounded(amount in any::<u128>(), bps in 0u16..=100u16) {
        let policy = FeePolicy::new(bps).unwrap();
        let fee = policy.fee_for(amount);
        prop_assert!(fee <= amount);

        if let Some(product) = amount.checked_mul(u128::from(bps)) {
            prop_assert_eq!(fee, product / 10_000);
        }
    }

    /// Property: when the outbound rail refuses, withdraw and stop fail
    /// without changing the stream record, the fee ledger, or any balance.
    #[test]
    fn prop_failed_settlement_is_invisible(
        rate in 1u128..1_000_000u128,
        duration in 1u64..86_400u64,
        fee_bps in 0u16..=100u16,
        elapsed in 1u64..100_000u64,
    ) {
        let total = rate * u128::from(duration);
        let mut h = harness(fee_bps, total);
        let id = open(&mut h, rate, duration);
        h.clock.set(elapsed);

        let before = h.ledger.get_stream(id).unwrap();
        let fees_before = h.ledger.fee_balance(&h.asset);
        let custody_before = h.vault.custody_balance(&h.asset);

        h.port.refuse_outbound(true);
        prop_assert!(h.ledger.withdraw(&h.provider, id).is_err());
        prop_assert!(h.ledger.stop_stream(&h.payer, id).is_err());
        h.port.refuse_outbound(false);

        prop_assert_eq!(h.ledger.get_stream(id).unwrap(), before);
        prop_assert_eq!(h.ledger.fee_balance(&h.asset), fees_before);
        prop_assert_eq!(h.vault.custody_balance(&h.asset), custody_before);

        // The rail coming back makes the same stop succeed.
        prop_assert!(h.ledger.stop_stream(&h.payer, id).is_ok());
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_independent_streams_settle_independently() {
        let mut h = harness(10, 0);
        let eurc = Asset::new("EURC");
        let payer_2 = AccountId::new("payer-2");
        let provider_2 = AccountId::new("provider-2");
        h.vault.mint(&h.asset, &h.payer, 1_800_000);
        h.vault.mint(&eurc, &payer_2, 600_000);

        let first = open(&mut h, 1_000, 1_800);
        let second = h
            .ledger
            .open_stream(StreamRequest {
                payer: payer_2.clone(),
                provider: provider_2.clone(),
                asset: eurc.clone(),
                rate_per_second: 100,
                duration_seconds: 6_000,
                service_id: None,
            })
            .unwrap();

        h.clock.set(600);
        h.ledger.withdraw(&h.provider, first).unwrap();

        // The second stream is untouched by the first one's withdrawal.
        assert_eq!(h.ledger.earned(second).unwrap(), 60_000);
        assert_eq!(h.ledger.get_stream(second).unwrap().withdrawn_amount, 0);

        h.ledger.stop_stream(&h.payer, first).unwrap();
        assert!(!h.ledger.get_stream(second).unwrap().stopped);

        // Fee balances are per asset.
        assert_eq!(h.ledger.fee_balance(&h.asset), 600);
        assert_eq!(h.ledger.fee_balance(&eurc), 0);

        // The second stream's stop collects its own fee in its own asset.
        h.ledger.stop_stream(&payer_2, second).unwrap();
        assert_eq!(h.ledger.fee_balance(&eurc), 60);

        h.ledger.sweep_fees(&h.admin, &h.asset, &h.treasury).unwrap();
        h.ledger.sweep_fees(&h.admin, &eurc, &h.treasury).unwrap();

        assert_eq!(h.vault.custody_balance(&h.asset), 0);
        assert_eq!(h.vault.custody_balance(&eurc), 0);
    }

    #[test]
    fn test_fee_rate_change_mid_stream_conserves_value() {
        let mut h = harness(0, 1_800_000);
        let id = open(&mut h, 1_000, 1_800);

        h.clock.set(600);
        h.ledger.withdraw(&h.provider, id).unwrap();

        h.ledger.set_fee(&h.admin, 100).unwrap();
        h.clock.set(1_200);
        h.ledger.withdraw(&h.provider, id).unwrap();

        h.clock.set(1_500);
        h.ledger.stop_stream(&h.payer, id).unwrap();
        h.ledger.sweep_fees(&h.admin, &h.asset, &h.treasury).unwrap();

        let recovered = h.vault.balance(&h.asset, &h.payer)
            + h.vault.balance(&h.asset, &h.provider)
            + h.vault.balance(&h.asset, &h.treasury);
        assert_eq!(recovered, 1_800_000);

        // First withdrawal was fee-free; the later ones paid 1%.
        assert_eq!(h.vault.balance(&h.asset, &h.treasury), 6_000 + 3_000);
    }
}
