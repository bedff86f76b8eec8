#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Stablecoin (x402) payment adapter for payfetch.
//!
//! Implements the P-chain side of the engine: probing x402 challenges on
//! EVM and Solana rails, renegotiating from in-flight 402s, signing via
//! an injected [`signer::PaymentSigner`], and delivering the proof
//! adaptively across HTTP verbs and header generations. Wallet account
//! provisioning and balance reads live here too.
//!
//! # Modules
//!
//! - [`adapter`] - The [`adapter::ChainAdapter`] protocol implementation
//! - [`delivery`] - Delivery planning and the adaptive retry loop
//! - [`negotiation`] - Re-deriving payment terms from a 402 in flight
//! - [`signer`] - The injected signing contract
//! - [`wallet`] - Single-flight account provisioning and balances

pub mod adapter;
pub mod delivery;
mod http;
pub mod negotiation;
pub mod signer;
pub mod wallet;

pub use adapter::ChainAdapter;
pub use signer::PaymentSigner;
pub use wallet::{AccountProvisioner, BalanceSource, WalletBalance, WalletManager};
