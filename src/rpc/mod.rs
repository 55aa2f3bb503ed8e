//! Node RPC surfaces.
//!
//! Defines the `BitcoinRpc` and `DefiRpc` traits the engine is written
//! against, and `JsonRpcClient`, the HTTP implementation of both.

pub mod client;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{
    AnchorTemplate, FeeEstimate, FundOptions, FundedTx, RawMempoolEntry, RawTransaction, SignedTx,
};

pub use client::JsonRpcClient;

/// Calls the anchoring pipeline makes against the Bitcoin node's wallet.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    /// Liveness check (`getbestblockhash`).
    async fn best_block_hash(&self) -> Result<String>;

    /// `estimatesmartfee conf_target estimate_mode`.
    async fn estimate_smart_fee(&self, conf_target: u16, estimate_mode: &str)
        -> Result<FeeEstimate>;

    /// `getrawmempool true`, keyed by txid.
    async fn raw_mempool(&self) -> Result<BTreeMap<String, RawMempoolEntry>>;

    /// `getrawtransaction txid true`.
    async fn raw_transaction(&self, txid: &str) -> Result<RawTransaction>;

    /// `decoderawtransaction hex`.
    async fn decode_raw_transaction(&self, hex: &str) -> Result<RawTransaction>;

    /// `fundrawtransaction hex options`.
    async fn fund_raw_transaction(&self, hex: &str, options: FundOptions) -> Result<FundedTx>;

    /// `signrawtransactionwithwallet hex`.
    async fn sign_raw_transaction_with_wallet(&self, hex: &str) -> Result<SignedTx>;

    /// `sendrawtransaction hex`, returns the txid.
    async fn send_raw_transaction(&self, hex: &str) -> Result<String>;
}

/// Calls the anchoring pipeline makes against the DeFi node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DefiRpc: Send + Sync {
    /// Liveness check (`getbestblockhash`).
    async fn best_block_hash(&self) -> Result<String>;

    /// `spv_createanchortemplate reward_address`.
    async fn create_anchor_template(&self, reward_address: &str) -> Result<AnchorTemplate>;
}
