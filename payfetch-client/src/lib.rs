#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Fetch orchestration for payfetch.
//!
//! This crate assembles the engine: a [`router::ProtocolRouter`] over the
//! chain and Lightning adapters, the [`client::PaymentClient`] that runs
//! detection → chain selection → budget gate → payment → fallback for
//! each fetch, the [`budget::BudgetManager`] and
//! [`history::PaymentHistory`] it accounts into, and the event surface
//! callers observe it through.
//!
//! # Example
//!
//! ```no_run
//! use payfetch::config::ClientConfig;
//! use payfetch_client::{FetchOptions, PaymentClient};
//!
//! # async fn run(signer: std::sync::Arc<dyn payfetch_chain::PaymentSigner>) -> Result<(), payfetch::error::Error> {
//! let client = PaymentClient::builder(ClientConfig::default())
//!     .chain_signer(signer)
//!     .build()
//!     .await?;
//! let response = client
//!     .fetch("https://api.example/quotes", FetchOptions::default())
//!     .await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`client`] - The fetch orchestrator and its builder
//! - [`router`] - Registration-ordered adapter dispatch
//! - [`budget`] - Limit checks, spend accounting, persistence
//! - [`history`] - Bounded payment history with JSONL persistence
//! - [`selection`] - Chain selection over multi-accept quotes
//! - [`events`] - Lifecycle events and listeners
//! - [`response`] - The payment-annotated response wrapper
//! - [`status`] - Composite wallet status snapshot

pub mod budget;
pub mod client;
pub mod events;
pub mod history;
pub mod response;
pub mod router;
pub mod selection;
pub mod status;

pub use budget::{BudgetCheck, BudgetManager, BudgetPeriod, BudgetSnapshot, BudgetWarning};
pub use client::{FetchOptions, PaymentClient, PaymentClientBuilder};
pub use events::{ClientEvent, EventListener};
pub use history::PaymentHistory;
pub use response::{PaidResponse, PaymentInfo};
pub use router::{Probe, ProtocolRouter};
pub use status::{FamilyStatus, LightningStatus, WalletStatus};

use payfetch::config::LogLevel;

/// Installs a stderr `tracing` subscriber honouring the configured log
/// level. Opt-in: the library never installs a global subscriber on its
/// own, and calling this twice is a no-op.
pub fn init_logging(level: LogLevel) {
    let Some(filter) = level.as_filter_str() else {
        return;
    };
    let directives = format!(
        "payfetch={filter},payfetch_chain={filter},payfetch_ln={filter},payfetch_client={filter}"
    );
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(directives))
        .with_writer(std::io::stderr)
        .try_init();
}
