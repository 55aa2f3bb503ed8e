//! Fee rate selection for the anchor transaction.

use tracing::debug;

use crate::config::FeeRateSettings;
use crate::error::{AnchorError, Result};
use crate::rpc::BitcoinRpc;
use crate::types::FeeRate;

/// Chooses the fee rate for one round, either a fixed literal or the node's
/// smart-fee estimate. Nothing is cached between rounds.
#[derive(Debug, Clone)]
pub struct FeeRatePolicy {
    settings: FeeRateSettings,
}

impl FeeRatePolicy {
    pub fn new(settings: FeeRateSettings) -> Self {
        Self { settings }
    }

    pub async fn resolve(&self, btc: &dyn BitcoinRpc) -> Result<FeeRate> {
        match &self.settings {
            FeeRateSettings::Fixed { rate } => Ok(FeeRate(*rate)),
            FeeRateSettings::Estimation {
                conf_target,
                estimate_mode,
            } => {
                let estimate = btc.estimate_smart_fee(*conf_target, estimate_mode).await?;
                debug!(?estimate, conf_target, estimate_mode, "Fee estimate");
                match estimate.feerate {
                    Some(rate) => Ok(FeeRate(rate)),
                    None => Err(AnchorError::Protocol(format!(
                        "estimatesmartfee.feerate field not found{}",
                        estimate
                            .errors
                            .map(|errs| format!(": {}", errs.join(", ")))
                            .unwrap_or_default()
                    ))),
                }
            }
        }
    }
}
