//! End-to-end anchoring rounds against in-memory nodes.

mod common;

use rust_decimal_macros::dec;
use std::time::Duration;

use common::{settings, MemoryLog, MockBitcoinNode, MockDefiNode, ANCHORS_ADDRESS};
use dfi_anchor::config::Settings;
use dfi_anchor::engine::{AnchorRound, RetryScheduler, RoundOptions, Stage};
use dfi_anchor::error::{AnchorError, TxStage};
use dfi_anchor::log::Severity;

/// Run the scheduler in single-shot mode and return its exit status.
async fn run_once(
    cfg: &Settings,
    options: RoundOptions,
    log: &MemoryLog,
    btc: &MockBitcoinNode,
    dfi: &MockDefiNode,
) -> i32 {
    let scheduler = RetryScheduler::new(Duration::ZERO, log);
    scheduler
        .run(move || async move { AnchorRound::new(cfg, options, log).run(btc, dfi).await })
        .await
}

#[tokio::test]
async fn test_unchecked_round_broadcasts_and_exits_zero() {
    let cfg = settings();
    let log = MemoryLog::new();
    let btc = MockBitcoinNode::new();
    // Reward 5 is below the minimum of 10, but the profit check is off.
    let dfi = MockDefiNode::new(dec!(5));
    let options = RoundOptions {
        check_competing: false,
        check_profit: false,
        ..RoundOptions::default()
    };

    let code = run_once(&cfg, options, &log, &btc, &dfi).await;

    assert_eq!(code, 0);
    assert!(btc.called("sendrawtransaction"));
    assert!(!btc.called("getrawmempool"));
    assert!(!btc.called("estimatesmartfee"));
    assert_eq!(log.at(Severity::Warning).len(), 2);
    assert!(log.contains(&format!("* BTC anchor transaction: {}", "ab".repeat(32))));
}

#[tokio::test]
async fn test_unchecked_round_outcome() {
    let cfg = settings();
    let log = MemoryLog::new();
    let btc = MockBitcoinNode::new();
    let dfi = MockDefiNode::new(dec!(5));
    let options = RoundOptions {
        check_competing: false,
        check_profit: false,
        ..RoundOptions::default()
    };

    let outcome = AnchorRound::new(&cfg, options, &log)
        .run(&btc, &dfi)
        .await
        .unwrap();

    assert_eq!(outcome.skipped, vec![Stage::CompetingCheck, Stage::ProfitCheck]);
    assert_eq!(outcome.fee_rate.as_decimal(), dec!(0.0002));
    assert_eq!(outcome.signed.unwrap().hex, "0200000001-funded-signed");
    assert_eq!(outcome.txid, Some("ab".repeat(32)));
}

#[tokio::test]
async fn test_competing_anchor_aborts_before_template() {
    let cfg = settings();
    let log = MemoryLog::new();
    let btc = MockBitcoinNode::new();
    // 0.0001 over 250 vbytes = 0.0004, times 1.5 beats our 0.0002; 30s old.
    btc.add_mempool_tx("rival", ANCHORS_ADDRESS, dec!(0.0001), 30);
    btc.add_mempool_tx("payment", "1SomebodyElse", dec!(0.0001), 30);
    let dfi = MockDefiNode::new(dec!(20));

    let err = AnchorRound::new(&cfg, RoundOptions::default(), &log)
        .run(&btc, &dfi)
        .await
        .unwrap_err();

    match err {
        AnchorError::CompetitionDetected { txids } => assert_eq!(txids, vec!["rival".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(dfi.templates_created(), 0);
    assert!(!btc.called("fundrawtransaction"));
}

#[tokio::test]
async fn test_competing_anchor_single_shot_exits_one() {
    let cfg = settings();
    let log = MemoryLog::new();
    let btc = MockBitcoinNode::new();
    btc.add_mempool_tx("rival", ANCHORS_ADDRESS, dec!(0.0001), 30);
    let dfi = MockDefiNode::new(dec!(20));

    let code = run_once(&cfg, RoundOptions::default(), &log, &btc, &dfi).await;

    assert_eq!(code, 1);
    let errors = log.at(Severity::Critical);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("competing anchors present in mempool"));
    // One initial pass plus three repeats.
    let passes = btc.calls().iter().filter(|c| *c == "getrawmempool").count();
    assert_eq!(passes, 4);
}

#[tokio::test]
async fn test_stale_rival_is_ignored() {
    let cfg = settings();
    let log = MemoryLog::new();
    let btc = MockBitcoinNode::new();
    // Older than the 600s timeout, so OneOf drops it.
    btc.add_mempool_tx("stale", ANCHORS_ADDRESS, dec!(0.0001), 3600);
    let dfi = MockDefiNode::new(dec!(20));

    let outcome = AnchorRound::new(&cfg, RoundOptions::default(), &log)
        .run(&btc, &dfi)
        .await
        .unwrap();

    assert!(outcome.txid.is_some());
    assert!(!btc.called("getrawtransaction"));
}

#[tokio::test]
async fn test_incomplete_signature_never_broadcasts() {
    let cfg = settings();
    let log = MemoryLog::new();
    let btc = MockBitcoinNode::new();
    btc.set_sign_complete(false);
    let dfi = MockDefiNode::new(dec!(20));

    let err = AnchorRound::new(&cfg, RoundOptions::default(), &log)
        .run(&btc, &dfi)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnchorError::Transaction {
            stage: TxStage::Sign,
            ..
        }
    ));
    assert!(btc.called("signrawtransactionwithwallet"));
    assert!(!btc.called("sendrawtransaction"));
}

#[tokio::test]
async fn test_profit_check_rejects_small_reward() {
    let cfg = settings();
    let log = MemoryLog::new();
    let btc = MockBitcoinNode::new();
    let dfi = MockDefiNode::new(dec!(9.5));

    let err = AnchorRound::new(&cfg, RoundOptions::default(), &log)
        .run(&btc, &dfi)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Minimum profit conditions not met: DeFi reward 9.5 DFI < 10 DFI"
    );
    assert!(!btc.called("decoderawtransaction"));
}
