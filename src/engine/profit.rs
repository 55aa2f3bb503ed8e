//! Minimum reward check.

use rust_decimal::Decimal;

use crate::config::ProfitSettings;
use crate::error::{AnchorError, Result};
use crate::types::AnchorTemplate;

/// Rejects templates whose estimated reward is below the configured minimum.
#[derive(Debug, Clone)]
pub struct ProfitGuard {
    min_reward: Decimal,
}

impl ProfitGuard {
    pub fn new(settings: &ProfitSettings) -> Self {
        Self {
            min_reward: settings.min_dfi_reward,
        }
    }

    /// The minimum is inclusive: a reward equal to it passes.
    pub fn check(&self, template: &AnchorTemplate) -> Result<()> {
        if template.estimated_reward < self.min_reward {
            return Err(AnchorError::ProfitRejected {
                reward: template.estimated_reward,
                minimum: self.min_reward,
            });
        }
        Ok(())
    }
}
