#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Lightning (L402/LSAT) payment adapter for payfetch.
//!
//! Implements the P-ln side of the engine: parsing both challenge
//! dialects out of `www-authenticate`, decoding invoice amounts through
//! an injected BOLT11 decoder, paying through an opaque wallet handle,
//! and retrying with the macaroon/preimage authorisation or the
//! payment-hash body the dialect demands.
//!
//! # Modules
//!
//! - [`adapter`] - The [`adapter::LightningAdapter`] protocol implementation
//! - [`challenge`] - L402/LSAT challenge dialect parsing
//! - [`invoice`] - BOLT11 decoder contract and amount extraction
//! - [`wallet`] - Wallet contract and single-flight connection manager

pub mod adapter;
pub mod challenge;
pub mod invoice;
pub mod wallet;

pub use adapter::{LIGHTNING_NETWORK, LightningAdapter};
pub use challenge::{Challenge, ChallengeKind};
pub use invoice::{Bolt11Decoder, Bolt11DecoderFactory, InvoiceSection};
pub use wallet::{LightningConnector, LightningWallet, LnWalletManager, PaidInvoice};
