//! Observability records
//!
//! Every successful mutating operation emits exactly one [`EngineEvent`]:
//! into the structured log, and to any live broadcast subscribers. Events
//! carry a per-engine sequence number assigned in commit order, so a
//! subscriber can detect gaps after lagging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::types::{AccountId, Asset, ServiceId, StreamId};

/// What happened, with the figures an auditor needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    /// A stream was opened and fully funded
    StreamStarted {
        /// Newly assigned stream
        stream_id: StreamId,
        /// Funding account
        payer: AccountId,
        /// Earning account
        provider: AccountId,
        /// Asset streamed
        asset: Asset,
        /// Base units per second
        rate_per_second: u128,
        /// Accrual window in seconds
        duration_seconds: u64,
        /// Locked upfront
        total_amount: u128,
        /// Directory listing paid for, if any
        service_id: Option<ServiceId>,
    },

    /// The provider claimed earned funds
    StreamWithdrawn {
        /// Stream drawn from
        stream_id: StreamId,
        /// Earning account
        provider: AccountId,
        /// Net paid to the provider
        net_amount: u128,
        /// Fee retained by the protocol
        fee: u128,
    },

    /// The payer terminated the stream and it settled
    StreamStopped {
        /// Stream settled
        stream_id: StreamId,
        /// Account that triggered the stop
        payer: AccountId,
        /// Net paid to the provider
        provider_amount: u128,
        /// Unearned funds returned to the payer
        payer_refund: u128,
        /// Fee retained by the protocol
        fee: u128,
    },

    /// The admin changed the protocol fee rate
    FeeUpdated {
        /// Rate before the change, basis points
        old_bps: u16,
        /// Rate after the change, basis points
        new_bps: u16,
    },

    /// The admin withdrew the accrued fee balance of one asset
    FeesSwept {
        /// Asset swept
        asset: Asset,
        /// Receiving account
        recipient: AccountId,
        /// Entire balance at the time of the sweep
        amount: u128,
    },
}

/// A committed state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Commit-order sequence number, from zero, no gaps
    pub seq: u64,

    /// Wall-clock emission time
    pub at: DateTime<Utc>,

    /// What happened
    pub kind: EventKind,
}

/// Assigns sequence numbers and fans events out
///
/// Owned by the engine's writer task; `emit` takes `&mut self`, so sequence
/// numbers are assigned in the same order state changes commit.
#[derive(Debug)]
pub struct EventSink {
    tx: broadcast::Sender<EngineEvent>,
    next_seq: u64,
}

impl EventSink {
    /// Create a sink whose subscribers buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, next_seq: 0 }
    }

    /// Broadcast handle for creating subscriptions
    pub fn sender(&self) -> broadcast::Sender<EngineEvent> {
        self.tx.clone()
    }

    /// Record a committed operation
    pub fn emit(&mut self, kind: EventKind) {
        let event = EngineEvent {
            seq: self.next_seq,
            at: Utc::now(),
            kind,
        };
        self.next_seq += 1;

        log_event(&event);

        // A send error only means no subscriber is listening right now.
        let _ = self.tx.send(event);
    }
}

fn log_event(event: &EngineEvent) {
    match &event.kind {
        EventKind::StreamStarted {
            stream_id,
            payer,
            provider,
            asset,
            rate_per_second,
            duration_seconds,
            total_amount,
            service_id,
        } => {
            info!(
                seq = event.seq,
                %stream_id,
                %payer,
                %provider,
                %asset,
                rate_per_second = %rate_per_second,
                duration_seconds,
                total_amount = %total_amount,
                service_id = ?service_id,
                "stream started"
            );
        }
        EventKind::StreamWithdrawn {
            stream_id,
            provider,
            net_amount,
            fee,
        } => {
            info!(
                seq = event.seq,
                %stream_id,
                %provider,
                net_amount = %net_amount,
                fee = %fee,
                "stream withdrawn"
            );
        }
        EventKind::StreamStopped {
            stream_id,
            payer,
            provider_amount,
            payer_refund,
            fee,
        } => {
            info!(
                seq = event.seq,
                %stream_id,
                %payer,
                provider_amount = %provider_amount,
                payer_refund = %payer_refund,
                fee = %fee,
                "stream stopped"
            );
        }
        EventKind::FeeUpdated { old_bps, new_bps } => {
            info!(seq = event.seq, old_bps, new_bps, "fee updated");
        }
        EventKind::FeesSwept {
            asset,
            recipient,
            amount,
        } => {
            info!(
                seq = event.seq,
                %asset,
                %recipient,
                amount = %amount,
                "fees swept"
            );
        }
    }
}
