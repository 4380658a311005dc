//! Actor-based concurrency for the engine
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One task owns all ledger state, so operations cannot interleave
//! - Exclusive `&mut` access doubles as the reentrancy lock: an operation
//!   in flight cannot be entered again, not even by a misbehaving port
//! - Async message passing with backpressure from the bounded mailbox
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Callers (API layer, tests, tools)           │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ EngineHandle (Clone)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              mpsc::channel (bounded)                 │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ one message at a time
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │             EngineActor (single task)                │
//! │   StreamLedger: validate, commit, call port,         │
//! │   roll back on port failure, emit event              │
//! └──────────────────────────────────────────────────────┘
//! ```

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::ledger::StreamLedger;
use crate::types::{AccountId, Asset, Settlement, Stream, StreamId, StreamRequest};

/// Message sent to the engine actor
pub enum EngineMessage {
    /// Open a new stream
    OpenStream {
        request: StreamRequest,
        response: oneshot::Sender<Result<StreamId>>,
    },

    /// Withdraw all earned, not-yet-withdrawn funds
    Withdraw {
        caller: AccountId,
        id: StreamId,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Stop and settle a stream
    StopStream {
        caller: AccountId,
        id: StreamId,
        response: oneshot::Sender<Result<Settlement>>,
    },

    /// Change the protocol fee rate
    SetFee {
        caller: AccountId,
        new_bps: u16,
        response: oneshot::Sender<Result<u16>>,
    },

    /// Withdraw an asset's accrued fee balance
    SweepFees {
        caller: AccountId,
        asset: Asset,
        recipient: AccountId,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Look up a stream record
    GetStream {
        id: StreamId,
        response: oneshot::Sender<Result<Stream>>,
    },

    /// Total earned so far
    Earned {
        id: StreamId,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Earned and not yet withdrawn
    Withdrawable {
        id: StreamId,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Seconds of accrual left
    RemainingTime {
        id: StreamId,
        response: oneshot::Sender<Result<u64>>,
    },

    /// Number of streams ever created
    StreamCount { response: oneshot::Sender<u64> },

    /// Accrued fee balance for an asset
    FeeBalance {
        asset: Asset,
        response: oneshot::Sender<u128>,
    },

    /// Current fee rate
    FeeBps { response: oneshot::Sender<u16> },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes engine messages
pub struct EngineActor {
    /// Ledger state and operation logic
    ledger: StreamLedger,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<EngineMessage>,
}

impl EngineActor {
    /// Create new actor
    pub fn new(ledger: StreamLedger, mailbox: mpsc::Receiver<EngineMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor event loop
    ///
    /// Exits when a shutdown message arrives or every handle is dropped.
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                EngineMessage::Shutdown => break,
                other => self.handle_message(other),
            }
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: EngineMessage) {
        match msg {
            EngineMessage::OpenStream { request, response } => {
                let _ = response.send(self.ledger.open_stream(request));
            }

            EngineMessage::Withdraw {
                caller,
                id,
                response,
            } => {
                let _ = response.send(self.ledger.withdraw(&caller, id));
            }

            EngineMessage::StopStream {
                caller,
                id,
                response,
            } => {
                let _ = response.send(self.ledger.stop_stream(&caller, id));
            }

            EngineMessage::SetFee {
                caller,
                new_bps,
                response,
            } => {
                let _ = response.send(self.ledger.set_fee(&caller, new_bps));
            }

            EngineMessage::SweepFees {
                caller,
                asset,
                recipient,
                response,
            } => {
                let _ = response.send(self.ledger.sweep_fees(&caller, &asset, &recipient));
            }

            EngineMessage::GetStream { id, response } => {
                let _ = response.send(self.ledger.get_stream(id));
            }

            EngineMessage::Earned { id, response } => {
                let _ = response.send(self.ledger.earned(id));
            }

            EngineMessage::Withdrawable { id, response } => {
                let _ = response.send(self.ledger.withdrawable(id));
            }

            EngineMessage::RemainingTime { id, response } => {
                let _ = response.send(self.ledger.remaining_time(id));
            }

            EngineMessage::StreamCount { response } => {
                let _ = response.send(self.ledger.stream_count());
            }

            EngineMessage::FeeBalance { asset, response } => {
                let _ = response.send(self.ledger.fee_balance(&asset));
            }

            EngineMessage::FeeBps { response } => {
                let _ = response.send(self.ledger.fee_bps());
            }

            EngineMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineMessage>,
}

impl EngineHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<EngineMessage>) -> Self {
        Self { sender }
    }

    /// Open a stream, locking `rate * duration` from the payer
    pub async fn open_stream(&self, request: StreamRequest) -> Result<StreamId> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::OpenStream {
                request,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Withdraw everything earned and not yet withdrawn to the provider
    pub async fn withdraw(&self, caller: AccountId, id: StreamId) -> Result<u128> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::Withdraw {
                caller,
                id,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Stop and settle a stream
    pub async fn stop_stream(&self, caller: AccountId, id: StreamId) -> Result<Settlement> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::StopStream {
                caller,
                id,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Change the protocol fee rate, returning the previous rate
    pub async fn set_fee(&self, caller: AccountId, new_bps: u16) -> Result<u16> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::SetFee {
                caller,
                new_bps,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Withdraw an asset's entire accrued fee balance
    pub async fn sweep_fees(
        &self,
        caller: AccountId,
        asset: Asset,
        recipient: AccountId,
    ) -> Result<u128> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::SweepFees {
                caller,
                asset,
                recipient,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Look up a stream record
    pub async fn get_stream(&self, id: StreamId) -> Result<Stream> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::GetStream { id, response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Total earned by the provider so far
    pub async fn earned(&self, id: StreamId) -> Result<u128> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::Earned { id, response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Earned and not yet withdrawn
    pub async fn withdrawable(&self, id: StreamId) -> Result<u128> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::Withdrawable { id, response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Seconds of accrual left; zero once stopped or expired
    pub async fn remaining_time(&self, id: StreamId) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::RemainingTime { id, response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Number of streams ever created
    pub async fn stream_count(&self) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::StreamCount { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Accrued fee balance for an asset
    pub async fn fee_balance(&self, asset: Asset) -> Result<u128> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::FeeBalance {
                asset,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Current fee rate in basis points
    pub async fn fee_bps(&self) -> Result<u16> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineMessage::FeeBps { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(EngineMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the engine actor
pub fn spawn_engine_actor(ledger: StreamLedger, mailbox_capacity: usize) -> EngineHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = EngineActor::new(ledger, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    EngineHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::EventSink;
    use crate::fees::FeePolicy;
    use crate::metrics::Metrics;
    use crate::vault::CustodyVault;
    use std::sync::Arc;

    fn spawn_test_engine(clock: Arc<ManualClock>) -> (EngineHandle, Arc<CustodyVault>) {
        let vault = Arc::new(CustodyVault::new(AccountId::new("custody")));
        for i in 0..16 {
            vault.mint(
                &Asset::new("USDC"),
                &AccountId::new(format!("payer-{}", i)),
                10_000_000,
            );
        }

        let ledger = StreamLedger::new(
            AccountId::new("admin-1"),
            FeePolicy::new(10).unwrap(),
            vault.clone(),
            None,
            clock,
            EventSink::new(64),
            Metrics::new().unwrap(),
        );
        (spawn_engine_actor(ledger, 1000), vault)
    }

    fn request(i: usize) -> StreamRequest {
        StreamRequest {
            payer: AccountId::new(format!("payer-{}", i)),
            provider: AccountId::new(format!("provider-{}", i)),
            asset: Asset::new("USDC"),
            rate_per_second: 100,
            duration_seconds: 600,
            service_id: None,
        }
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (handle, _vault) = spawn_test_engine(Arc::new(ManualClock::new(0)));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_flow_through_handle() {
        let clock = Arc::new(ManualClock::new(0));
        let (handle, vault) = spawn_test_engine(clock.clone());

        let id = handle.open_stream(request(0)).await.unwrap();
        assert_eq!(id, StreamId::new(0));

        clock.set(300);
        assert_eq!(handle.earned(id).await.unwrap(), 30_000);

        let net = handle
            .withdraw(AccountId::new("provider-0"), id)
            .await
            .unwrap();
        assert_eq!(net, 29_970);

        let settlement = handle
            .stop_stream(AccountId::new("payer-0"), id)
            .await
            .unwrap();
        assert_eq!(settlement.payer_refund, 30_000);

        assert_eq!(handle.fee_balance(Asset::new("USDC")).await.unwrap(), 30);
        assert_eq!(
            vault.balance(&Asset::new("USDC"), &AccountId::new("provider-0")),
            29_970
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_opens_get_unique_ids() {
        let (handle, _vault) = spawn_test_engine(Arc::new(ManualClock::new(0)));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.open_stream(request(i)).await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
        assert_eq!(handle.stream_count().await.unwrap(), 16);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_after_shutdown_reports_concurrency_error() {
        let (handle, _vault) = spawn_test_engine(Arc::new(ManualClock::new(0)));
        handle.shutdown().await.unwrap();

        // The actor drains nothing after shutdown; the call must fail
        // rather than hang.
        let result = handle.stream_count().await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
    }
}
