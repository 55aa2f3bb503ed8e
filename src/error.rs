//! Error types for the anchoring pipeline.
//!
//! Every fatal condition of a round is one variant of [`AnchorError`].
//! Errors unwind to the round boundary, where the scheduler logs them and
//! decides whether another cycle runs.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Result type for anchoring operations.
pub type Result<T> = std::result::Result<T, AnchorError>;

/// The two chains the tool talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Bitcoin,
    Defi,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Bitcoin => write!(f, "Bitcoin"),
            Chain::Defi => write!(f, "DeFi"),
        }
    }
}

/// Which part of anchor submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Fund,
    Sign,
    Broadcast,
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStage::Fund => write!(f, "fund"),
            TxStage::Sign => write!(f, "sign"),
            TxStage::Broadcast => write!(f, "send"),
        }
    }
}

/// Errors that stop an anchoring round (or, for `Config`, the whole process).
#[derive(Debug, Error)]
pub enum AnchorError {
    /// Missing or invalid settings field.
    #[error("configuration error: {0}")]
    Config(String),

    /// RPC endpoint unreachable.
    #[error("{chain} RPC connection refused: {message}")]
    Connectivity { chain: Chain, message: String },

    /// The node answered with a JSON-RPC error object.
    #[error("{chain} RPC error ({method}): {message}")]
    Rpc {
        chain: Chain,
        method: String,
        message: String,
    },

    /// The node's response lacks fields this tool relies on.
    #[error("incompatible RPC version ({0})")]
    Protocol(String),

    /// A competing anchor is already waiting in the Bitcoin mempool.
    #[error("competing anchors present in mempool: {txids:?}")]
    CompetitionDetected { txids: Vec<String> },

    /// The template's reward is below the configured minimum.
    #[error("Minimum profit conditions not met: DeFi reward {reward} DFI < {minimum} DFI")]
    ProfitRejected { reward: Decimal, minimum: Decimal },

    /// Funding, signing or broadcasting the anchor failed.
    #[error("failed to {stage} transaction: {message}")]
    Transaction { stage: TxStage, message: String },
}

impl AnchorError {
    /// Whether a later cycle can be expected to succeed.
    ///
    /// Configuration errors never resolve by themselves; everything else is
    /// tied to the current state of the nodes or the mempool.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AnchorError::Config(_))
    }

    pub(crate) fn tx(stage: TxStage, message: impl Into<String>) -> Self {
        AnchorError::Transaction {
            stage,
            message: message.into(),
        }
    }
}
