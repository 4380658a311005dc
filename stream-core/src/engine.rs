//! Main engine facade
//!
//! Wires configuration, ports, metrics, and the event sink into a running
//! writer task, and hands out cloneable handles and event subscriptions.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::actor::{spawn_engine_actor, EngineHandle};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventSink};
use crate::fees::FeePolicy;
use crate::ledger::StreamLedger;
use crate::metrics::Metrics;
use crate::port::{DirectoryPort, TransferPort};

/// Stream settlement engine
pub struct StreamEngine {
    /// Handle to the writer task
    handle: EngineHandle,

    /// Broadcast side of the event sink
    events: broadcast::Sender<EngineEvent>,

    /// Metrics shared with the writer task
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl StreamEngine {
    /// Validate configuration and start the writer task
    ///
    /// Must be called from within a Tokio runtime. The transfer port is
    /// required; the directory port is optional and only consulted for
    /// streams opened against a listed service.
    pub fn start(
        config: Config,
        transfer: Arc<dyn TransferPort>,
        directory: Option<Arc<dyn DirectoryPort>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to build metrics registry: {}", e)))?;
        let fee_policy = FeePolicy::new(config.fee.initial_bps)?;
        let events = EventSink::new(config.channels.event_buffer);
        let event_sender = events.sender();

        let ledger = StreamLedger::new(
            config.admin.clone(),
            fee_policy,
            transfer,
            directory,
            clock,
            events,
            metrics.clone(),
        );
        let handle = spawn_engine_actor(ledger, config.channels.mailbox_capacity);

        info!(
            service = %config.service_name,
            version = %config.service_version,
            fee_bps = config.fee.initial_bps,
            "stream engine started"
        );

        Ok(Self {
            handle,
            events: event_sender,
            metrics,
            config,
        })
    }

    /// Cloneable client for engine operations
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Subscribe to committed-operation events
    ///
    /// The subscription starts at the next event; history is not replayed.
    pub fn subscribe(&self) -> BroadcastStream<EngineEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    /// Metrics collector backing this engine
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration the engine was started with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the writer task
    ///
    /// Operations already queued ahead of the shutdown message still run.
    pub async fn shutdown(self) -> Result<()> {
        info!(service = %self.config.service_name, "stream engine shutting down");
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::EventKind;
    use crate::types::{AccountId, Asset, StreamRequest};
    use crate::vault::CustodyVault;
    use tokio_stream::StreamExt;

    fn test_setup() -> (Config, Arc<CustodyVault>, Arc<ManualClock>) {
        let mut config = Config::default();
        config.admin = AccountId::new("admin-1");
        config.fee.initial_bps = 10;

        let vault = Arc::new(CustodyVault::new(AccountId::new("custody")));
        vault.mint(&Asset::new("USDC"), &AccountId::new("payer-1"), 10_000_000);

        (config, vault, Arc::new(ManualClock::new(0)))
    }

    fn request() -> StreamRequest {
        StreamRequest {
            payer: AccountId::new("payer-1"),
            provider: AccountId::new("provider-1"),
            asset: Asset::new("USDC"),
            rate_per_second: 1_000,
            duration_seconds: 1_800,
            service_id: None,
        }
    }

    #[tokio::test]
    async fn test_engine_start_and_shutdown() {
        let (config, vault, clock) = test_setup();
        let engine = StreamEngine::start(config, vault, None, clock).unwrap();
        assert_eq!(engine.config().fee.initial_bps, 10);
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_engine_rejects_invalid_config() {
        let (mut config, vault, clock) = test_setup();
        config.fee.initial_bps = 5_000;
        assert!(matches!(
            StreamEngine::start(config, vault, None, clock),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_subscription_sees_committed_operations() {
        let (config, vault, clock) = test_setup();
        let engine = StreamEngine::start(config, vault, None, clock.clone()).unwrap();
        let mut events = engine.subscribe();
        let handle = engine.handle();

        let id = handle.open_stream(request()).await.unwrap();
        clock.set(600);
        handle
            .withdraw(AccountId::new("provider-1"), id)
            .await
            .unwrap();

        let started = events.next().await.unwrap().unwrap();
        assert_eq!(started.seq, 0);
        assert!(matches!(started.kind, EventKind::StreamStarted { .. }));

        let withdrawn = events.next().await.unwrap().unwrap();
        assert_eq!(withdrawn.seq, 1);
        assert!(matches!(
            withdrawn.kind,
            EventKind::StreamWithdrawn {
                net_amount: 599_400,
                fee: 600,
                ..
            }
        ));

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_metrics_reflect_operations() {
        let (config, vault, clock) = test_setup();
        let engine = StreamEngine::start(config, vault, None, clock.clone()).unwrap();
        let handle = engine.handle();

        let id = handle.open_stream(request()).await.unwrap();
        clock.set(900);
        handle
            .stop_stream(AccountId::new("payer-1"), id)
            .await
            .unwrap();

        assert_eq!(engine.metrics().streams_opened.get(), 1);
        assert_eq!(engine.metrics().streams_stopped.get(), 1);
        assert_eq!(engine.metrics().active_streams.get(), 0);

        engine.shutdown().await.unwrap();
    }
}
