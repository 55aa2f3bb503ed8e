//! Competing anchor detection.
//!
//! Walks the Bitcoin mempool looking for anchor transactions from other
//! producers that would beat ours. Looking up a full transaction is slow, so
//! after the first pass the mempool is re-read a few more times to catch
//! transactions that arrived in the meantime. Each later pass only looks at
//! txids the earlier passes have not seen, so it is much cheaper.

use chrono::Utc;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{AnchoringSettings, CompetingMode};
use crate::error::{AnchorError, Result};
use crate::rpc::BitcoinRpc;
use crate::types::{CheckedSet, FeeRate, MempoolEntry};

/// Progress of one multi-pass scan.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    pub checked: CheckedSet,
    /// Passes still to run after the current one.
    pub remaining_passes: u32,
    pub passes_run: u32,
    /// Competing txids found so far, in discovery order.
    pub competing: Vec<String>,
}

impl ScanState {
    pub fn new(extra_passes: u32) -> Self {
        Self {
            remaining_passes: extra_passes,
            ..Self::default()
        }
    }
}

pub struct CompetingAnchorScanner {
    mode: CompetingMode,
    tx_timeout: Duration,
    fee_rate_advantage: Decimal,
    extra_passes: u32,
    anchors_address: String,
    clock: fn() -> i64,
}

fn unix_now() -> i64 {
    Utc::now().timestamp()
}

impl CompetingAnchorScanner {
    pub fn new(settings: &AnchoringSettings) -> Self {
        let competing = &settings.competing;
        Self {
            mode: competing.mode,
            tx_timeout: competing.tx_timeout,
            fee_rate_advantage: competing.fee_rate_advantage,
            extra_passes: competing.repeat_checks,
            anchors_address: settings.anchors_address.clone(),
            clock: unix_now,
        }
    }

    /// Replace the wall clock used to age mempool entries.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Run a full scan and return the competing txids.
    pub async fn scan(&self, btc: &dyn BitcoinRpc, our_rate: FeeRate) -> Result<Vec<String>> {
        let mut state = ScanState::new(self.extra_passes);
        self.run(btc, our_rate, &mut state).await?;
        Ok(state.competing)
    }

    /// Run passes until `state.remaining_passes` is exhausted.
    ///
    /// `state.checked` carries over between passes, so no txid is ever
    /// evaluated twice.
    pub async fn run(
        &self,
        btc: &dyn BitcoinRpc,
        our_rate: FeeRate,
        state: &mut ScanState,
    ) -> Result<()> {
        loop {
            let found = self.pass(btc, our_rate, &mut state.checked).await?;
            state.passes_run += 1;
            state.competing.extend(found);

            if state.remaining_passes == 0 {
                break;
            }
            state.remaining_passes -= 1;
        }

        info!(
            passes = state.passes_run,
            checked = state.checked.len(),
            competing = state.competing.len(),
            "Mempool scan finished"
        );
        Ok(())
    }

    /// One read of the mempool.
    pub async fn pass(
        &self,
        btc: &dyn BitcoinRpc,
        our_rate: FeeRate,
        checked: &mut CheckedSet,
    ) -> Result<Vec<String>> {
        let pool = btc.raw_mempool().await?;
        let mut competing = Vec::new();

        for (txid, raw) in &pool {
            if checked.contains(txid) {
                continue;
            }
            let entry = MempoolEntry::from_raw(txid, raw)?;
            checked.mark(txid);

            // Cheap checks first, the full transaction lookup is expensive.
            // Lookups take a while, so every entry is aged against a fresh clock.
            let now = (self.clock)();
            if !self.is_candidate(&entry, our_rate, now)? {
                continue;
            }

            let tx = match btc.raw_transaction(txid).await {
                Ok(tx) => tx,
                Err(AnchorError::Rpc { message, .. }) => {
                    // Confirmed or evicted since the mempool snapshot.
                    debug!(txid = %txid, error = %message, "Mempool transaction gone");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if tx.pays_to(&self.anchors_address) {
                debug!(txid = %txid, "Competing anchor found");
                competing.push(txid.clone());
            }
        }

        Ok(competing)
    }

    fn is_candidate(&self, entry: &MempoolEntry, our_rate: FeeRate, now: i64) -> Result<bool> {
        let rate = entry.fee_rate()?;
        let fee_rate_competitive = rate.as_decimal() * self.fee_rate_advantage > our_rate.as_decimal();
        let age_competitive = (entry.age(now) as f64) < self.tx_timeout.as_secs_f64();
        Ok(self.mode.admits(fee_rate_competitive, age_competitive))
    }
}
