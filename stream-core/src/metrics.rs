//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the engine.
//!
//! # Metrics
//!
//! - `flowrail_streams_opened_total` - Streams opened
//! - `flowrail_streams_stopped_total` - Streams stopped and settled
//! - `flowrail_withdrawals_total` - Successful provider withdrawals
//! - `flowrail_fee_sweeps_total` - Fee balance sweeps
//! - `flowrail_operations_rejected_total` - Operations rejected by validation or ports
//! - `flowrail_active_streams` - Streams open and not yet stopped
//! - `flowrail_value_locked_base_units` - Value locked at open (base units)
//! - `flowrail_value_paid_out_base_units` - Net value paid to providers
//! - `flowrail_value_refunded_base_units` - Value refunded to payers
//! - `flowrail_fees_collected_base_units` - Protocol fees retained

use prometheus::{Counter, IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Each engine owns its own registry; counters are registered there with
/// `with_opts` rather than through the process-global default registry, so
/// several engines can coexist in one process (tests rely on this).
#[derive(Clone)]
pub struct Metrics {
    /// Streams opened
    pub streams_opened: IntCounter,

    /// Streams stopped and settled
    pub streams_stopped: IntCounter,

    /// Successful provider withdrawals
    pub withdrawals: IntCounter,

    /// Fee balance sweeps
    pub fee_sweeps: IntCounter,

    /// Operations rejected by validation or ports
    pub operations_rejected: IntCounter,

    /// Streams open and not yet stopped
    pub active_streams: IntGauge,

    /// Value locked at open, base units
    pub value_locked: Counter,

    /// Net value paid to providers, base units
    pub value_paid_out: Counter,

    /// Value refunded to payers, base units
    pub value_refunded: Counter,

    /// Protocol fees retained, base units
    pub fees_collected: Counter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let streams_opened = IntCounter::with_opts(Opts::new(
            "flowrail_streams_opened_total",
            "Streams opened",
        ))?;
        registry.register(Box::new(streams_opened.clone()))?;

        let streams_stopped = IntCounter::with_opts(Opts::new(
            "flowrail_streams_stopped_total",
            "Streams stopped and settled",
        ))?;
        registry.register(Box::new(streams_stopped.clone()))?;

        let withdrawals = IntCounter::with_opts(Opts::new(
            "flowrail_withdrawals_total",
            "Successful provider withdrawals",
        ))?;
        registry.register(Box::new(withdrawals.clone()))?;

        let fee_sweeps = IntCounter::with_opts(Opts::new(
            "flowrail_fee_sweeps_total",
            "Fee balance sweeps",
        ))?;
        registry.register(Box::new(fee_sweeps.clone()))?;

        let operations_rejected = IntCounter::with_opts(Opts::new(
            "flowrail_operations_rejected_total",
            "Operations rejected by validation or ports",
        ))?;
        registry.register(Box::new(operations_rejected.clone()))?;

        let active_streams = IntGauge::with_opts(Opts::new(
            "flowrail_active_streams",
            "Streams open and not yet stopped",
        ))?;
        registry.register(Box::new(active_streams.clone()))?;

        let value_locked = Counter::with_opts(Opts::new(
            "flowrail_value_locked_base_units",
            "Value locked at open, base units",
        ))?;
        registry.register(Box::new(value_locked.clone()))?;

        let value_paid_out = Counter::with_opts(Opts::new(
            "flowrail_value_paid_out_base_units",
            "Net value paid to providers, base units",
        ))?;
        registry.register(Box::new(value_paid_out.clone()))?;

        let value_refunded = Counter::with_opts(Opts::new(
            "flowrail_value_refunded_base_units",
            "Value refunded to payers, base units",
        ))?;
        registry.register(Box::new(value_refunded.clone()))?;

        let fees_collected = Counter::with_opts(Opts::new(
            "flowrail_fees_collected_base_units",
            "Protocol fees retained, base units",
        ))?;
        registry.register(Box::new(fees_collected.clone()))?;

        Ok(Self {
            streams_opened,
            streams_stopped,
            withdrawals,
            fee_sweeps,
            operations_rejected,
            active_streams,
            value_locked,
            value_paid_out,
            value_refunded,
            fees_collected,
            registry,
        })
    }

    /// Record a stream open
    pub fn record_open(&self, total_amount: u128) {
        self.streams_opened.inc();
        self.active_streams.inc();
        self.value_locked.inc_by(total_amount as f64);
    }

    /// Record a withdrawal
    pub fn record_withdraw(&self, net_amount: u128, fee: u128) {
        self.withdrawals.inc();
        self.value_paid_out.inc_by(net_amount as f64);
        self.fees_collected.inc_by(fee as f64);
    }

    /// Record a stop settlement
    pub fn record_stop(&self, provider_amount: u128, payer_refund: u128, fee: u128) {
        self.streams_stopped.inc();
        self.active_streams.dec();
        self.value_paid_out.inc_by(provider_amount as f64);
        self.value_refunded.inc_by(payer_refund as f64);
        self.fees_collected.inc_by(fee as f64);
    }

    /// Record a fee sweep
    pub fn record_sweep(&self) {
        self.fee_sweeps.inc();
    }

    /// Record a rejected operation
    pub fn record_rejection(&self) {
        self.operations_rejected.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
