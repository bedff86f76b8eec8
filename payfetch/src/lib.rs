#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the payfetch client-side payment engine.
//!
//! payfetch fetches HTTP resources that may answer `402 Payment Required`,
//! negotiates the amount and settlement rail with the server, signs and
//! delivers a payment proof, and returns the final response. This crate
//! holds the protocol-agnostic foundations; the rails live in
//! `payfetch-chain` (stablecoin x402) and `payfetch-ln` (Lightning L402),
//! and the orchestration in `payfetch-client`.
//!
//! # Modules
//!
//! - [`money`] - Integer-only monetary values (USD cents, SATS)
//! - [`chain`] - Chain identifiers and family resolution
//! - [`networks`] - Known-network and USDC deployment tables
//! - [`proto`] - Payment-required wire formats and the parser cascade
//! - [`offer`] - Normalised quotes and accept options
//! - [`adapter`] - The protocol adapter contract
//! - [`error`] - Error taxonomy with stable codes
//! - [`record`] - Completed-payment records
//! - [`config`] - Client configuration and validation
//! - [`encoding`] - Base64 utilities

pub mod adapter;
pub mod chain;
pub mod config;
pub mod encoding;
pub mod error;
pub mod money;
pub mod networks;
pub mod offer;
pub mod proto;
pub mod record;

pub use adapter::{CapturedResponse, ProtocolAdapter, ProtocolRequest, ProtocolResult};
pub use chain::{ChainId, ChainNamespace};
pub use config::{BudgetLimits, ClientConfig, LogLevel};
pub use error::{DeliveryDiagnosis, DiagnosisPhase, Error, ErrorKind};
pub use money::{Currency, Money};
pub use offer::{AcceptOption, InputHints, Protocol, ProtocolQuote};
pub use record::PaymentRecord;
