//! Configuration loading from TOML.
//!
//! The settings document is first deserialized into loose `Raw*` structs that
//! mirror its layout, then validated once into the typed [`Settings`] tree.
//! Nothing downstream ever sees a missing field or an unknown mode string.

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AnchorError, Result};

/// Extra mempool passes after the first one, unless configured otherwise.
pub const DEFAULT_REPEAT_CHECKS: u32 = 3;

/// Per-request HTTP timeout for the RPC clients, unless configured otherwise.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Typed settings
// ---------------------------------------------------------------------------

/// Validated, read-only settings tree.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dfi: DefiSettings,
    pub btc: BitcoinSettings,
}

/// Connection details for one node.
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub hostname: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BitcoinSettings {
    pub rpc: RpcSettings,
    pub wallet_name: String,
    pub fee_rate: FeeRateSettings,
}

/// How the anchor's fee rate is chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum FeeRateSettings {
    /// Use this rate as-is.
    Fixed { rate: Decimal },
    /// Ask the node's `estimatesmartfee`.
    Estimation {
        conf_target: u16,
        estimate_mode: String,
    },
}

#[derive(Debug, Clone)]
pub struct DefiSettings {
    pub rpc: RpcSettings,
    pub anchoring: AnchoringSettings,
}

#[derive(Debug, Clone)]
pub struct AnchoringSettings {
    pub competing: CompetingSettings,
    pub profit: ProfitSettings,
    /// Address that receives the anchoring reward on the DeFi chain.
    pub reward_address: String,
    /// Bitcoin address every anchor transaction pays to.
    pub anchors_address: String,
}

/// Rules for deciding whether a mempool transaction outcompetes ours.
#[derive(Debug, Clone)]
pub struct CompetingSettings {
    pub mode: CompetingMode,
    /// Transactions younger than this are considered live competitors.
    pub tx_timeout: Duration,
    /// Multiplier applied to a competitor's fee rate before comparing.
    pub fee_rate_advantage: Decimal,
    /// Extra passes over the mempool after the first one.
    pub repeat_checks: u32,
}

#[derive(Debug, Clone)]
pub struct ProfitSettings {
    pub min_dfi_reward: Decimal,
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeRateMode {
    Estimation,
    Fixed,
}

impl FromStr for FeeRateMode {
    type Err = AnchorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Estimation" => Ok(FeeRateMode::Estimation),
            "Fixed" => Ok(FeeRateMode::Fixed),
            _ => Err(AnchorError::Config(
                "FeeRate mode must be one of ['Estimation', 'Fixed']".into(),
            )),
        }
    }
}

/// How the fee-rate and age predicates combine.
///
/// The names do not read the way they behave: `OneOf` only keeps a
/// transaction when both predicates hold, `AllOf` keeps it when either does.
/// Anchoring operators depend on this behaviour, so it is kept as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompetingMode {
    OneOf,
    AllOf,
}

impl CompetingMode {
    /// Whether a transaction with these predicate results stays a candidate.
    pub fn admits(&self, fee_rate_competitive: bool, age_competitive: bool) -> bool {
        match self {
            CompetingMode::OneOf => fee_rate_competitive && age_competitive,
            CompetingMode::AllOf => fee_rate_competitive || age_competitive,
        }
    }
}

impl FromStr for CompetingMode {
    type Err = AnchorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OneOf" => Ok(CompetingMode::OneOf),
            "AllOf" => Ok(CompetingMode::AllOf),
            _ => Err(AnchorError::Config(
                "Competing mode must be one of ['OneOf', 'AllOf']".into(),
            )),
        }
    }
}

impl fmt::Display for CompetingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompetingMode::OneOf => write!(f, "OneOf"),
            CompetingMode::AllOf => write!(f, "AllOf"),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw document layout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(rename = "DFI")]
    dfi: Option<RawDefi>,
    #[serde(rename = "BTC")]
    btc: Option<RawBitcoin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRpc {
    hostname: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<SecretString>,
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawBitcoin {
    #[serde(rename = "RPC")]
    rpc: Option<RawRpc>,
    #[serde(rename = "Wallet")]
    wallet: Option<RawWallet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawWallet {
    wallet_name: Option<String>,
    fee_rate: Option<RawFeeRate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawFeeRate {
    mode: Option<String>,
    estimation: Option<RawEstimation>,
    fixed_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEstimation {
    conf_target: Option<u16>,
    estimate_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDefi {
    #[serde(rename = "RPC")]
    rpc: Option<RawRpc>,
    #[serde(rename = "Anchoring")]
    anchoring: Option<RawAnchoring>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAnchoring {
    competing: Option<RawCompeting>,
    profit: Option<RawProfit>,
    reward_address: Option<String>,
    anchors_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCompeting {
    mode: Option<String>,
    tx_timeout: Option<f64>,
    fee_rate_advantage: Option<Decimal>,
    repeat_checks: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawProfit {
    min_dfi_reward: Option<Decimal>,
}

fn require<T>(value: Option<T>, path: &str) -> Result<T> {
    value.ok_or_else(|| AnchorError::Config(format!("config field not found: {path}")))
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl Settings {
    /// Load and validate settings from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| AnchorError::Config(format!("{path}: failed to read: {e}")))?;
        Self::from_toml_str(&contents)
            .map_err(|e| AnchorError::Config(format!("{path}: {}", config_message(e))))
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawSettings = toml::from_str(contents)
            .map_err(|e| AnchorError::Config(format!("parsing error: {e}")))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self> {
        // DFI first, then BTC.
        let dfi = DefiSettings::from_raw(require(raw.dfi, "DFI")?)?;
        let btc = BitcoinSettings::from_raw(require(raw.btc, "BTC")?)?;
        Ok(Self { dfi, btc })
    }
}

fn config_message(err: AnchorError) -> String {
    match err {
        AnchorError::Config(msg) => msg,
        other => other.to_string(),
    }
}

impl RpcSettings {
    fn from_raw(raw: RawRpc, prefix: &str) -> Result<Self> {
        Ok(Self {
            hostname: require(raw.hostname, &format!("{prefix}.RPC.Hostname"))?,
            port: require(raw.port, &format!("{prefix}.RPC.Port"))?,
            user: require(raw.user, &format!("{prefix}.RPC.User"))?,
            password: require(raw.password, &format!("{prefix}.RPC.Password"))?,
            timeout: Duration::from_secs(raw.timeout.unwrap_or(DEFAULT_RPC_TIMEOUT_SECS)),
        })
    }

    /// Base URL of the node, without credentials.
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.hostname, self.port)
    }
}

impl BitcoinSettings {
    fn from_raw(raw: RawBitcoin) -> Result<Self> {
        let rpc = RpcSettings::from_raw(require(raw.rpc, "BTC.RPC")?, "BTC")?;
        let wallet = require(raw.wallet, "BTC.Wallet")?;
        let fee_rate = require(wallet.fee_rate, "BTC.Wallet.FeeRate")?;
        let mode: FeeRateMode = require(fee_rate.mode, "BTC.Wallet.FeeRate.Mode")?.parse()?;
        let wallet_name = require(wallet.wallet_name, "BTC.Wallet.WalletName")?;

        let fee_rate = match mode {
            FeeRateMode::Estimation => {
                let est = require(fee_rate.estimation, "BTC.Wallet.FeeRate.Estimation")?;
                FeeRateSettings::Estimation {
                    conf_target: require(
                        est.conf_target,
                        "BTC.Wallet.FeeRate.Estimation.ConfTarget",
                    )?,
                    estimate_mode: require(
                        est.estimate_mode,
                        "BTC.Wallet.FeeRate.Estimation.EstimateMode",
                    )?,
                }
            }
            FeeRateMode::Fixed => FeeRateSettings::Fixed {
                rate: require(fee_rate.fixed_rate, "BTC.Wallet.FeeRate.FixedRate")?,
            },
        };

        Ok(Self {
            rpc,
            wallet_name,
            fee_rate,
        })
    }
}

impl DefiSettings {
    fn from_raw(raw: RawDefi) -> Result<Self> {
        let rpc = RpcSettings::from_raw(require(raw.rpc, "DFI.RPC")?, "DFI")?;
        let anchoring = require(raw.anchoring, "DFI.Anchoring")?;
        let competing = require(anchoring.competing, "DFI.Anchoring.Competing")?;
        let mode: CompetingMode =
            require(competing.mode, "DFI.Anchoring.Competing.Mode")?.parse()?;
        let profit = require(anchoring.profit, "DFI.Anchoring.Profit")?;
        let tx_timeout = require(competing.tx_timeout, "DFI.Anchoring.Competing.TxTimeout")?;
        let tx_timeout = Duration::try_from_secs_f64(tx_timeout).map_err(|e| {
            AnchorError::Config(format!("DFI.Anchoring.Competing.TxTimeout: {e}"))
        })?;

        Ok(Self {
            rpc,
            anchoring: AnchoringSettings {
                competing: CompetingSettings {
                    mode,
                    tx_timeout,
                    fee_rate_advantage: require(
                        competing.fee_rate_advantage,
                        "DFI.Anchoring.Competing.FeeRateAdvantage",
                    )?,
                    repeat_checks: competing.repeat_checks.unwrap_or(DEFAULT_REPEAT_CHECKS),
                },
                profit: ProfitSettings {
                    min_dfi_reward: require(
                        profit.min_dfi_reward,
                        "DFI.Anchoring.Profit.MinDfiReward",
                    )?,
                },
                reward_address: require(
                    anchoring.reward_address,
                    "DFI.Anchoring.RewardAddress",
                )?,
                anchors_address: require(
                    anchoring.anchors_address,
                    "DFI.Anchoring.AnchorsAddress",
                )?,
            },
        })
    }
}
