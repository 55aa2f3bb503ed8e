//! One anchoring attempt.
//!
//! check connections → fee rate → competing anchors → template → profit →
//! fund/sign → broadcast. The competing check, the profit check, creation and
//! broadcast can each be switched off; a skipped stage is logged as a
//! warning and the round carries on. The first error ends the round.

use std::fmt;

use crate::config::Settings;
use crate::engine::fee::FeeRatePolicy;
use crate::engine::profit::ProfitGuard;
use crate::engine::scanner::CompetingAnchorScanner;
use crate::engine::submitter::AnchorSubmitter;
use crate::error::{AnchorError, Chain, Result};
use crate::log::AnchorLog;
use crate::rpc::{BitcoinRpc, DefiRpc, JsonRpcClient};
use crate::types::{AnchorTemplate, FeeRate, SignedTx};

/// Stages a caller may switch off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CompetingCheck,
    ProfitCheck,
    Creation,
    Broadcast,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::CompetingCheck => write!(f, "checking competing anchors in BTC mempool"),
            Stage::ProfitCheck => write!(f, "checking minimum profit conditions"),
            Stage::Creation => write!(f, "creation of anchor transaction"),
            Stage::Broadcast => write!(f, "sending anchor transaction"),
        }
    }
}

/// Which optional stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOptions {
    pub check_competing: bool,
    pub check_profit: bool,
    pub create_anchor: bool,
    pub send_anchor: bool,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            check_competing: true,
            check_profit: true,
            create_anchor: true,
            send_anchor: true,
        }
    }
}

/// What a successful round did.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub fee_rate: FeeRate,
    pub template: Option<AnchorTemplate>,
    pub signed: Option<SignedTx>,
    /// Bitcoin txid of the broadcast anchor.
    pub txid: Option<String>,
    pub skipped: Vec<Stage>,
}

impl RoundOutcome {
    fn new(fee_rate: FeeRate) -> Self {
        Self {
            fee_rate,
            template: None,
            signed: None,
            txid: None,
            skipped: Vec::new(),
        }
    }
}

/// Open fresh connections to both nodes: (Bitcoin wallet, DeFi).
pub fn open_connections(settings: &Settings) -> Result<(JsonRpcClient, JsonRpcClient)> {
    let btc = JsonRpcClient::new(
        Chain::Bitcoin,
        &settings.btc.rpc,
        Some(settings.btc.wallet_name.as_str()),
    )?;
    let dfi = JsonRpcClient::new(Chain::Defi, &settings.dfi.rpc, None)?;
    Ok((btc, dfi))
}

pub struct AnchorRound<'a> {
    settings: &'a Settings,
    options: RoundOptions,
    log: &'a dyn AnchorLog,
}

impl<'a> AnchorRound<'a> {
    pub fn new(settings: &'a Settings, options: RoundOptions, log: &'a dyn AnchorLog) -> Self {
        Self {
            settings,
            options,
            log,
        }
    }

    pub async fn run(&self, btc: &dyn BitcoinRpc, dfi: &dyn DefiRpc) -> Result<RoundOutcome> {
        DefiRpc::best_block_hash(dfi).await?;
        BitcoinRpc::best_block_hash(btc).await?;

        let fee_rate = FeeRatePolicy::new(self.settings.btc.fee_rate.clone())
            .resolve(btc)
            .await?;
        let mut outcome = RoundOutcome::new(fee_rate);

        let anchoring = &self.settings.dfi.anchoring;

        if self.options.check_competing {
            self.log.info(&Stage::CompetingCheck.to_string());
            let competing = CompetingAnchorScanner::new(anchoring)
                .scan(btc, fee_rate)
                .await?;
            if !competing.is_empty() {
                return Err(AnchorError::CompetitionDetected { txids: competing });
            }
            self.log.success("ok");
        } else {
            self.skip(&mut outcome, Stage::CompetingCheck);
        }

        self.log.info("requesting anchor template from DeFi RPC");
        let template = dfi.create_anchor_template(&anchoring.reward_address).await?;
        self.log.info(&format!("* DeFi block      : {}", template.defi_hash));
        self.log
            .info(&format!("* potential reward: {} DFI", template.estimated_reward));
        self.log.success("ok");

        if self.options.check_profit {
            self.log.info(&Stage::ProfitCheck.to_string());
            ProfitGuard::new(&anchoring.profit).check(&template)?;
            self.log.success("ok");
        } else {
            self.skip(&mut outcome, Stage::ProfitCheck);
        }

        if !self.options.create_anchor {
            self.skip(&mut outcome, Stage::Creation);
            outcome.template = Some(template);
            return Ok(outcome);
        }

        let submitter = AnchorSubmitter::new(btc);
        self.log.info(&Stage::Creation.to_string());
        let signed = submitter.create(&template.tx_hex, fee_rate).await?;
        self.log.success("ok");

        if !self.options.send_anchor {
            self.skip(&mut outcome, Stage::Broadcast);
            outcome.template = Some(template);
            outcome.signed = Some(signed);
            return Ok(outcome);
        }

        self.log.info(&Stage::Broadcast.to_string());
        let txid = submitter.broadcast(&signed).await?;
        self.log.info(&format!("* BTC anchor transaction: {txid}"));
        self.log.info(&format!("* DeFi block            : {}", template.defi_hash));
        self.log.info(&format!(
            "* potential reward      : {} DFI",
            template.estimated_reward
        ));
        self.log.success("ok");

        outcome.template = Some(template);
        outcome.signed = Some(signed);
        outcome.txid = Some(txid);
        Ok(outcome)
    }

    fn skip(&self, outcome: &mut RoundOutcome, stage: Stage) {
        self.log.warning(&format!("skip {stage}"));
        outcome.skipped.push(stage);
    }
}
