//! FlowRail Stream Core
//!
//! Pay-per-second settlement engine: a payer locks funds for a bounded
//! service session, the provider withdraws earned value incrementally, and
//! the payer can stop early for a pro-rated refund.
//!
//! # Architecture
//!
//! - **Single Writer**: one task owns all ledger state, so every operation
//!   runs start-to-finish against a consistent snapshot
//! - **Ports**: value movement and directory notifications go through trait
//!   objects supplied at startup
//! - **All-or-nothing**: a failed operation leaves no partial state behind
//!
//! # Invariants
//!
//! - Earned value never exceeds the locked total
//! - Withdrawn value never exceeds earned value
//! - Provider payouts + payer refund + protocol fees == locked total
//! - Stream ids are assigned densely and never reused

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accrual;
pub mod actor;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fees;
pub mod guard;
pub mod ledger;
pub mod metrics;
pub mod port;
pub mod types;
pub mod vault;

// Re-exports
pub use actor::EngineHandle;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use engine::StreamEngine;
pub use error::{Error, Result};
pub use events::{EngineEvent, EventKind};
pub use fees::{FeePolicy, MAX_FEE_BPS};
pub use ledger::StreamLedger;
pub use metrics::Metrics;
pub use port::{DirectoryPort, Payout, TransferPort};
pub use types::{
    AccountId, Asset, ServiceId, Settlement, Stream, StreamId, StreamRequest,
};
pub use vault::CustodyVault;
