//! Funding, signing and broadcasting the anchor transaction.
//!
//! The template arrives unsigned and unfunded. The Bitcoin wallet adds
//! inputs and a change output (placed after the template's own outputs so
//! the anchor outputs keep their positions), signs, and finally sends.

use tracing::debug;

use crate::error::{AnchorError, Result, TxStage};
use crate::rpc::BitcoinRpc;
use crate::types::{FeeRate, FundOptions, FundedTx, SignedTx};

pub struct AnchorSubmitter<'a> {
    btc: &'a dyn BitcoinRpc,
}

impl<'a> AnchorSubmitter<'a> {
    pub fn new(btc: &'a dyn BitcoinRpc) -> Self {
        Self { btc }
    }

    /// Fund and sign `tx_hex` at `fee_rate`.
    ///
    /// A partially signed result means the wallet does not hold every key;
    /// retrying cannot fix that, so it fails like any other signing error.
    pub async fn create(&self, tx_hex: &str, fee_rate: FeeRate) -> Result<SignedTx> {
        let funded = self.fund(tx_hex, fee_rate).await?;
        debug!(fee = ?funded.fee, changepos = ?funded.changepos, "Anchor funded");

        let signed = self
            .btc
            .sign_raw_transaction_with_wallet(&funded.hex)
            .await
            .map_err(|e| AnchorError::tx(TxStage::Sign, e.to_string()))?;
        if !signed.complete {
            return Err(AnchorError::tx(TxStage::Sign, "not all addresses are known"));
        }
        Ok(signed)
    }

    async fn fund(&self, tx_hex: &str, fee_rate: FeeRate) -> Result<FundedTx> {
        let decoded = self
            .btc
            .decode_raw_transaction(tx_hex)
            .await
            .map_err(|e| AnchorError::tx(TxStage::Fund, e.to_string()))?;

        let options = FundOptions {
            fee_rate,
            change_position: decoded.vout.len(),
        };
        self.btc
            .fund_raw_transaction(tx_hex, options)
            .await
            .map_err(|e| AnchorError::tx(TxStage::Fund, e.to_string()))
    }

    /// Broadcast a completely signed transaction and return its txid.
    pub async fn broadcast(&self, signed: &SignedTx) -> Result<String> {
        if !signed.complete {
            return Err(AnchorError::tx(TxStage::Sign, "not all addresses are known"));
        }
        self.btc
            .send_raw_transaction(&signed.hex)
            .await
            .map_err(|e| AnchorError::tx(TxStage::Broadcast, e.to_string()))
    }
}
