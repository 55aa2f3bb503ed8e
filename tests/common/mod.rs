//! In-memory Bitcoin and DeFi nodes for integration testing.
//!
//! Provides deterministic `BitcoinRpc` / `DefiRpc` implementations whose
//! responses are fully controllable from test code and which record every
//! call made against them.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Mutex;

use dfi_anchor::config::Settings;
use dfi_anchor::error::{AnchorError, Chain, Result};
use dfi_anchor::log::{AnchorLog, Severity};
use dfi_anchor::rpc::{BitcoinRpc, DefiRpc};
use dfi_anchor::types::*;

/// Keeps every progress message so tests can assert on what a round reported.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<(Severity, String)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().unwrap().clone()
    }

    /// Messages logged at `severity`.
    pub fn at(&self, severity: Severity) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, m)| m.contains(needle))
    }
}

impl AnchorLog for MemoryLog {
    fn emit(&self, severity: Severity, message: &str) {
        self.lines.lock().unwrap().push((severity, message.to_string()));
    }
}

pub const ANCHORS_ADDRESS: &str = "1FtZRFRQn2Mg8X5hCFsXVhv9qyyjUHR2jU";
pub const REWARD_ADDRESS: &str = "8Jz4ujYNpDnMUo3MxwrvkPTp8HWL1C7SWm";

/// Settings with a fixed 0.0002 fee rate and a minimum reward of 10 DFI.
pub fn settings() -> Settings {
    let text = format!(
        r#"
[DFI.RPC]
Hostname = "127.0.0.1"
Port = 8554
User = "dfi"
Password = "dfi"

[DFI.Anchoring]
RewardAddress = "{REWARD_ADDRESS}"
AnchorsAddress = "{ANCHORS_ADDRESS}"

[DFI.Anchoring.Competing]
Mode = "OneOf"
TxTimeout = 600
FeeRateAdvantage = 1.5

[DFI.Anchoring.Profit]
MinDfiReward = 10

[BTC.RPC]
Hostname = "127.0.0.1"
Port = 8332
User = "btc"
Password = "btc"

[BTC.Wallet]
WalletName = "anchors"

[BTC.Wallet.FeeRate]
Mode = "Fixed"
FixedRate = 0.0002
"#
    );
    Settings::from_toml_str(&text).expect("test settings are valid")
}

/// Scripted Bitcoin wallet node.
pub struct MockBitcoinNode {
    mempool: Mutex<BTreeMap<String, RawMempoolEntry>>,
    transactions: Mutex<BTreeMap<String, RawTransaction>>,
    sign_complete: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl MockBitcoinNode {
    pub fn new() -> Self {
        Self {
            mempool: Mutex::new(BTreeMap::new()),
            transactions: Mutex::new(BTreeMap::new()),
            sign_complete: Mutex::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Put a transaction paying `address` into the mempool, first seen
    /// `age_secs` ago and paying `base_fee` for 250 vbytes.
    pub fn add_mempool_tx(&self, txid: &str, address: &str, base_fee: Decimal, age_secs: i64) {
        self.mempool.lock().unwrap().insert(
            txid.to_string(),
            RawMempoolEntry {
                vsize: Some(250),
                fees: Some(RawMempoolFees { base: Some(base_fee) }),
                time: Some(Utc::now().timestamp() - age_secs),
            },
        );
        self.transactions.lock().unwrap().insert(
            txid.to_string(),
            RawTransaction {
                vout: vec![TxOutput {
                    script_pub_key: ScriptPubKey {
                        address: Some(address.to_string()),
                        addresses: None,
                    },
                }],
            },
        );
    }

    pub fn set_sign_complete(&self, complete: bool) {
        *self.sign_complete.lock().unwrap() = complete;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, method: &str) -> bool {
        self.calls().iter().any(|c| c == method)
    }

    fn record(&self, method: &str) {
        self.calls.lock().unwrap().push(method.to_string());
    }
}

#[async_trait]
impl BitcoinRpc for MockBitcoinNode {
    async fn best_block_hash(&self) -> Result<String> {
        self.record("getbestblockhash");
        Ok("00".repeat(32))
    }

    async fn estimate_smart_fee(&self, _conf_target: u16, _mode: &str) -> Result<FeeEstimate> {
        self.record("estimatesmartfee");
        Ok(FeeEstimate::default())
    }

    async fn raw_mempool(&self) -> Result<BTreeMap<String, RawMempoolEntry>> {
        self.record("getrawmempool");
        Ok(self.mempool.lock().unwrap().clone())
    }

    async fn raw_transaction(&self, txid: &str) -> Result<RawTransaction> {
        self.record("getrawtransaction");
        self.transactions
            .lock()
            .unwrap()
            .get(txid)
            .cloned()
            .ok_or_else(|| AnchorError::Rpc {
                chain: Chain::Bitcoin,
                method: "getrawtransaction".into(),
                message: "No such mempool or blockchain transaction".into(),
            })
    }

    async fn decode_raw_transaction(&self, _hex: &str) -> Result<RawTransaction> {
        self.record("decoderawtransaction");
        Ok(RawTransaction {
            vout: vec![TxOutput::default(), TxOutput::default()],
        })
    }

    async fn fund_raw_transaction(&self, hex: &str, options: FundOptions) -> Result<FundedTx> {
        self.record("fundrawtransaction");
        Ok(FundedTx {
            hex: format!("{hex}-funded"),
            fee: Some(Decimal::new(5000, 8)),
            changepos: Some(options.change_position as i64),
        })
    }

    async fn sign_raw_transaction_with_wallet(&self, hex: &str) -> Result<SignedTx> {
        self.record("signrawtransactionwithwallet");
        Ok(SignedTx {
            hex: format!("{hex}-signed"),
            complete: *self.sign_complete.lock().unwrap(),
        })
    }

    async fn send_raw_transaction(&self, _hex: &str) -> Result<String> {
        self.record("sendrawtransaction");
        Ok("ab".repeat(32))
    }
}

/// Scripted DeFi node producing a fixed anchor template.
pub struct MockDefiNode {
    reward: Decimal,
    templates_created: Mutex<u32>,
}

impl MockDefiNode {
    pub fn new(reward: Decimal) -> Self {
        Self {
            reward,
            templates_created: Mutex::new(0),
        }
    }

    pub fn templates_created(&self) -> u32 {
        *self.templates_created.lock().unwrap()
    }
}

#[async_trait]
impl DefiRpc for MockDefiNode {
    async fn best_block_hash(&self) -> Result<String> {
        Ok("11".repeat(32))
    }

    async fn create_anchor_template(&self, reward_address: &str) -> Result<AnchorTemplate> {
        assert_eq!(reward_address, REWARD_ADDRESS);
        *self.templates_created.lock().unwrap() += 1;
        Ok(AnchorTemplate {
            tx_hex: "0200000001".into(),
            defi_hash: "cd".repeat(32),
            estimated_reward: self.reward,
        })
    }
}
