//! dfi-anchor — submits DeFi anchor transactions to the Bitcoin chain.
//!
//! Entry point. Parses flags, loads and validates the settings, initialises
//! structured logging, and hands the anchoring round to the retry
//! scheduler.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::time::Duration;
use tracing::info;

use dfi_anchor::config::Settings;
use dfi_anchor::engine::{open_connections, AnchorRound, RetryScheduler, RoundOptions};
use dfi_anchor::log::{AnchorLog, TracingLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum YesNo {
    Yes,
    No,
}

impl YesNo {
    fn enabled(self) -> bool {
        self == YesNo::Yes
    }
}

/// A simple tool to submit DeFi anchors on the BTC blockchain.
#[derive(Debug, Parser)]
#[command(name = "dfi-anchor", version)]
struct Args {
    /// Config file in TOML format
    #[arg(long, value_name = "config.toml")]
    config: String,

    /// Check minimum profit conditions
    #[arg(long, value_enum, default_value = "yes")]
    checkprofit: YesNo,

    /// Check competing anchor transactions in mempool
    #[arg(long, value_enum, default_value = "yes")]
    checkcompeting: YesNo,

    /// Create the anchor transaction
    #[arg(long, value_enum, default_value = "yes")]
    createanchor: YesNo,

    /// Send the anchor transaction
    #[arg(long, value_enum, default_value = "yes")]
    sendanchor: YesNo,

    /// Run within an infinite loop every T seconds. If 0, run only once
    #[arg(long, value_name = "period", default_value_t = 0.0)]
    repeat: f64,
}

impl Args {
    fn round_options(&self) -> RoundOptions {
        RoundOptions {
            check_competing: self.checkcompeting.enabled(),
            check_profit: self.checkprofit.enabled(),
            create_anchor: self.createanchor.enabled(),
            send_anchor: self.sendanchor.enabled(),
        }
    }

    fn repeat_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.repeat)
            .with_context(|| format!("invalid --repeat period: {}", self.repeat))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let log = TracingLog;
    let interval = args.repeat_interval()?;

    let settings = match Settings::load(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            log.critical(&e.to_string());
            std::process::exit(1);
        }
    };

    let options = args.round_options();
    info!(
        config = %args.config,
        repeat_secs = args.repeat,
        ?options,
        "dfi-anchor starting up"
    );

    let scheduler = RetryScheduler::new(interval, &log);
    let settings = &settings;
    let round_log = &log;
    let round = move || async move {
        let (btc, dfi) = open_connections(settings)?;
        AnchorRound::new(settings, options, round_log)
            .run(&btc, &dfi)
            .await
    };

    let single_shot = scheduler.is_single_shot();
    let exit_code = tokio::select! {
        code = scheduler.run(round) => code,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
            interrupted_exit_code(single_shot)
        }
    };

    std::process::exit(exit_code);
}

/// Exit status after Ctrl+C. A single-shot round that was cut short did not
/// succeed; a repeating run has no round outcome to report.
fn interrupted_exit_code(single_shot: bool) -> i32 {
    if single_shot {
        1
    } else {
        0
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dfi_anchor=info"));

    if std::env::var("DFI_ANCHOR_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}
