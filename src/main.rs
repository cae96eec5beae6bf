use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sharpline::api::health::HealthState;
use sharpline::api::latency::LatencyStats;
use sharpline::api::{router, ApiState};
use sharpline::bankroll::WithdrawalInput;
use sharpline::clock::{SharedClock, SystemClock};
use sharpline::config::{Config, WithdrawalPolicy};
use sharpline::detector::SignalDetector;
use sharpline::error::Result;
use sharpline::guardrail::{default_rules, GuardrailEvaluator, LockoutStore, SessionTimer};
use sharpline::monitor::{
    HttpSnapshotSource, PrioritySource, SnapshotSource, SteamMonitor, StoreSource,
};
use sharpline::state::{BetLedger, LineHistoryStore, SignalBook};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let clock: SharedClock = Arc::new(SystemClock);

    // --- In-memory state ---
    let store = LineHistoryStore::new();
    let signals = SignalBook::new();
    let ledger = BetLedger::new();
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    // --- Snapshot source: external feed first, then whatever was posted to the API ---
    let local: Arc<dyn SnapshotSource> = Arc::new(StoreSource::new(Arc::clone(&store)));
    let source: Arc<dyn SnapshotSource> = match &cfg.feed_url {
        Some(url) => {
            info!("[FEED] polling {url}");
            let feed: Arc<dyn SnapshotSource> = Arc::new(HttpSnapshotSource::new("feed", url.clone())?);
            Arc::new(PrioritySource::new(vec![feed, local]))
        }
        None => {
            warn!("FEED_URL not set: steam monitor will only see snapshots posted to /snapshots");
            local
        }
    };

    // --- Steam monitor ---
    let monitor = Arc::new(
        SteamMonitor::new(
            source,
            cfg.monitor_config(),
            Arc::clone(&health),
            Arc::clone(&latency),
        )
        .with_sink(Arc::clone(&store)),
    );
    let monitor_handle = monitor.spawn();

    // --- Guardrails ---
    let evaluator = GuardrailEvaluator::new(
        cfg.guardrail_config()?,
        LockoutStore::new(Arc::clone(&clock)),
        SessionTimer::new(),
        Arc::clone(&clock),
    );
    let bankroll = WithdrawalInput {
        current_bankroll: cfg.current_bankroll,
        starting_bankroll: cfg.starting_bankroll,
        monthly_target: cfg.monthly_target,
        expected_edge: cfg.expected_edge,
        trailing_roi: None,
    };
    info!(
        "Bankroll: starting={:.2} current={:.2} target={:.2}/month edge={:.3}",
        cfg.starting_bankroll, cfg.current_bankroll, cfg.monthly_target, cfg.expected_edge,
    );

    // --- HTTP API server ---
    let api_state = ApiState {
        store,
        signals,
        detector: Arc::new(SignalDetector::new(cfg.detector_config())),
        monitor,
        ledger,
        evaluator: Arc::new(evaluator),
        rules: Arc::new(RwLock::new(default_rules())),
        bankroll: Arc::new(RwLock::new(bankroll)),
        withdrawal_policy: Arc::new(WithdrawalPolicy::default()),
        clock,
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down: waiting for in-flight poll");
    monitor_handle.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
