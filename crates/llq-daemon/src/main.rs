// crates/llq-daemon/src/main.rs
//
// Binary entrypoint for the LLQ PoSe daemon.
//
// Initializes tracing, parses CLI arguments, loads configuration, and runs
// either a production monitoring loop over configured member endpoints or a
// self-contained devnet cluster of simulated members.

mod config;
mod rounds;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::RwLock;

use config::{parse_hex_key, DaemonConfig};
use rounds::RoundRunner;

use llq_core::{Clock, Member, SystemClock};
use llq_gates::{GateId, GateRegistry, VALUE_ALWAYS};
use llq_pose::PoseScorer;
use llq_probe::{ComplianceChecker, Prober, ProbeTransport, TcpProbeTransport};
use llq_sim::TestContext;

/// LLQ PoSe daemon — probes quorum members, scores service failures, and
/// runs quorum sessions.
#[derive(Parser, Debug)]
#[command(name = "llq-daemon", version = "0.1.0", about = "Long-lived quorum PoSe daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "llq.toml")]
    config: String,

    /// Run a self-contained devnet of N simulated members (overrides the
    /// config file's devnet_members).
    #[arg(long)]
    devnet: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found.
    let mut daemon_config = match DaemonConfig::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!(
                "Could not load config from {}: {}. Using defaults.",
                args.config, e
            );
            DaemonConfig::default()
        }
    };
    if let Some(n) = args.devnet {
        daemon_config.devnet_members = n;
    }

    // Initialize tracing subscriber for structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(daemon_config.log_level.clone())
            }),
        )
        .init();

    tracing::info!("LLQ PoSe daemon v0.1.0");
    tracing::info!("Round interval: {}s", daemon_config.round_interval_secs);
    tracing::info!(
        "Minimum protocol version: {}",
        daemon_config.min_protocol_version
    );

    if daemon_config.devnet_members > 0 {
        run_devnet(&daemon_config).await
    } else {
        run_monitor(&daemon_config).await
    }
}

/// Production mode: monitor configured member endpoints over TCP.
///
/// Sessions need a wired member-to-member transport, so a standalone monitor
/// runs probe and compliance scoring only.
async fn run_monitor(config: &DaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.members.is_empty() {
        return Err("no members configured; add [[members]] entries or use --devnet".into());
    }

    let mut authority_keys = Vec::new();
    for hex in &config.gate_authority_keys {
        authority_keys.push(parse_hex_key(hex)?);
    }
    if authority_keys.is_empty() {
        tracing::warn!("No gate authority keys configured; all gates stay off");
    }
    let gates = Arc::new(RwLock::new(GateRegistry::new(
        authority_keys,
        config.min_gate_signers,
    )));

    let scorer = Arc::new(PoseScorer::new(config.pose_params()));
    for member_config in &config.members {
        let operator_key = parse_hex_key(&member_config.operator_key)?;
        let member = Member::new(
            member_config.endpoint.clone(),
            operator_key,
            member_config.protocol_version,
            0,
        );
        tracing::info!("Monitoring member {} at {}", member.id, member.endpoint);
        scorer.register(member, 0).await;
    }

    let prober = Arc::new(Prober::new(
        Arc::new(TcpProbeTransport) as Arc<dyn ProbeTransport>,
        Arc::new(SystemClock) as Arc<dyn Clock>,
    ));
    let runner = RoundRunner::new(
        scorer,
        prober,
        ComplianceChecker::new(config.min_protocol_version),
        gates,
        Duration::from_millis(config.probe_timeout_ms),
    );

    tracing::info!("Monitoring {} members", config.members.len());
    let mut ticker = tokio::time::interval(Duration::from_secs(config.round_interval_secs));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                match runner.run_round().await {
                    Ok(summary) => tracing::info!(
                        "Round {} at height {}: {} probed, {} unreachable, {} outdated",
                        summary.round,
                        summary.height,
                        summary.probed,
                        summary.unreachable,
                        summary.outdated
                    ),
                    Err(e) => tracing::error!("Round failed: {}", e),
                }
            }
        }
    }

    tracing::info!("LLQ daemon shut down gracefully");
    Ok(())
}

/// Devnet mode: a fully simulated cluster with all gates active, running
/// complete rounds including quorum sessions.
async fn run_devnet(config: &DaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let n = config.devnet_members;
    tracing::info!("Starting devnet cluster with {} simulated members", n);

    let ctx = TestContext::with_params(n, config.pose_params()).await;
    for gate in GateId::all() {
        ctx.set_gate(gate, VALUE_ALWAYS).await;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.round_interval_secs));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                match ctx.run_round().await {
                    Ok(report) => tracing::info!(
                        "Devnet round {} at height {}: session {} with {}/{} contributions",
                        report.round,
                        report.height,
                        report.stats.final_phase,
                        report.stats.contributions,
                        report.stats.members
                    ),
                    Err(e) => tracing::error!("Devnet round failed: {}", e),
                }
            }
        }
    }

    tracing::info!("LLQ daemon shut down gracefully");
    Ok(())
}
