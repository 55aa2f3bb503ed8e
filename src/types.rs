//! Shared types for the anchoring pipeline.
//!
//! Node responses (templates, mempool entries, transactions) and the small
//! value types the engine passes between its stages.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{AnchorError, Result};

/// Satoshis per coin; fee rates are truncated to this many fractional digits.
const COIN: Decimal = dec!(100000000);

// ---------------------------------------------------------------------------
// Fee rate
// ---------------------------------------------------------------------------

/// A fee rate in coins per 1000 virtual bytes, the unit the Bitcoin RPC
/// uses for `estimatesmartfee` and `fundrawtransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeRate(pub Decimal);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(Decimal::ZERO);

    /// Fee rate paid by a transaction, truncated to 8 fractional digits.
    ///
    /// `floor(base_fee * 10^8 * 1000 / vsize) / 10^8`. Truncation, never
    /// rounding, so every anchor producer derives the same value.
    pub fn from_fee_and_vsize(base_fee: Decimal, vsize: u64) -> Result<Self> {
        if vsize == 0 {
            return Err(AnchorError::Protocol("getrawmempool.vsize is zero".into()));
        }
        let scaled = (base_fee * COIN * dec!(1000) / Decimal::from(vsize)).trunc();
        Ok(FeeRate(scaled / COIN))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

// ---------------------------------------------------------------------------
// Anchor template
// ---------------------------------------------------------------------------

/// Anchor transaction template produced by `spv_createanchortemplate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorTemplate {
    /// Unsigned, unfunded Bitcoin transaction.
    pub tx_hex: String,
    /// DeFi block the anchor commits to.
    pub defi_hash: String,
    /// Reward paid if this anchor wins, in DFI.
    pub estimated_reward: Decimal,
}

// ---------------------------------------------------------------------------
// Mempool
// ---------------------------------------------------------------------------

/// One `getrawmempool true` entry as returned by the node.
///
/// Fields are optional so an old node can be told apart from a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMempoolEntry {
    #[serde(default)]
    pub vsize: Option<u64>,
    #[serde(default)]
    pub fees: Option<RawMempoolFees>,
    #[serde(default)]
    pub time: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMempoolFees {
    #[serde(default)]
    pub base: Option<Decimal>,
}

/// A validated pending transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct MempoolEntry {
    pub txid: String,
    pub vsize: u64,
    /// Fee without descendants or ancestors, in coins.
    pub base_fee: Decimal,
    /// Unix time the node first saw the transaction.
    pub time: i64,
}

impl MempoolEntry {
    pub fn from_raw(txid: &str, raw: &RawMempoolEntry) -> Result<Self> {
        let vsize = raw.vsize.ok_or_else(|| {
            AnchorError::Protocol("getrawmempool.vsize field not found".into())
        })?;
        let base_fee = raw
            .fees
            .as_ref()
            .and_then(|fees| fees.base)
            .ok_or_else(|| AnchorError::Protocol("getrawmempool.fees field not found".into()))?;
        let time = raw
            .time
            .ok_or_else(|| AnchorError::Protocol("getrawmempool.time field not found".into()))?;

        Ok(Self {
            txid: txid.to_string(),
            vsize,
            base_fee,
            time,
        })
    }

    pub fn fee_rate(&self) -> Result<FeeRate> {
        FeeRate::from_fee_and_vsize(self.base_fee, self.vsize)
    }

    /// Seconds since the node first saw this transaction.
    pub fn age(&self, now: i64) -> i64 {
        now - self.time
    }
}

/// Transaction ids already evaluated during one scan.
///
/// Only grows; dropped when the round ends.
#[derive(Debug, Clone, Default)]
pub struct CheckedSet {
    seen: HashSet<String>,
}

impl CheckedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `txid` as checked. Returns false if it already was.
    pub fn mark(&mut self, txid: &str) -> bool {
        self.seen.insert(txid.to_string())
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.seen.contains(txid)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Verbose transaction as returned by `getrawtransaction` or
/// `decoderawtransaction`. Only the outputs matter here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

impl RawTransaction {
    /// Whether any output pays `address`.
    pub fn pays_to(&self, address: &str) -> bool {
        self.vout.iter().any(|out| out.script_pub_key.has_address(address))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxOutput {
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: ScriptPubKey,
}

/// Output script summary. Older nodes report an `addresses` list, newer
/// ones a single `address`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
}

impl ScriptPubKey {
    pub fn has_address(&self, address: &str) -> bool {
        self.address.as_deref() == Some(address)
            || self
                .addresses
                .as_ref()
                .is_some_and(|list| list.iter().any(|a| a == address))
    }
}

/// `fundrawtransaction` options.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundOptions {
    pub fee_rate: FeeRate,
    pub change_position: usize,
}

/// `fundrawtransaction` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FundedTx {
    pub hex: String,
    #[serde(default)]
    pub fee: Option<Decimal>,
    #[serde(default)]
    pub changepos: Option<i64>,
}

/// `signrawtransactionwithwallet` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignedTx {
    pub hex: String,
    /// False when the wallet lacks keys for some inputs.
    pub complete: bool,
}

/// `estimatesmartfee` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeeEstimate {
    #[serde(default)]
    pub feerate: Option<Decimal>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    #[serde(default)]
    pub blocks: Option<u32>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
