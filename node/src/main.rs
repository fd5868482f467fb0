// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Meridian Validator Node
//!
//! The binary that wires `meridian-protocol`'s library pieces into a
//! running node. Startup order mirrors the original's: load config,
//! decide bootstrap-validator-or-peer from the `--port` value, open the
//! block store, open (or bootstrap) the chain, and — only on the
//! bootstrap validator — start the consensus engine and the block
//! producer. Every node, validator or peer, serves the RPC surface.

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use meridian_protocol::chain::Chain;
use meridian_protocol::config::{self, NodeConfig};
use meridian_protocol::consensus::ConsensusEngine;
use meridian_protocol::crypto::Keypair;
use meridian_protocol::mempool::Mempool;
use meridian_protocol::peer::PeerRegistry;
use meridian_protocol::producer::ValidatorLoop;
use meridian_protocol::storage::BlockStore;
use meridian_protocol::types::Block;

use api::AppState;
use cli::Cli;
use logging::LogFormat;
use metrics::NodeMetrics;

/// Everything spawned only for the bootstrap validator role, kept
/// together so shutdown can unwind it cleanly.
struct ValidatorHandles {
    consensus: Arc<ConsensusEngine>,
    ticker: JoinHandle<()>,
    finalizer: JoinHandle<()>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_format = LogFormat::from_str_lossy(&cli.log_format);
    logging::init_logging("meridian_node=info,meridian_protocol=info", log_format);

    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "meridian-node exiting");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    std::fs::create_dir_all(&cli.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            cli.data_dir.display()
        )
    })?;

    let node_config = match &cli.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => NodeConfig::load_default(&cli.data_dir).context("failed to load config.yaml")?,
    };

    let is_validator = config::is_bootstrap_addr(&cli.port);
    let god_key = Keypair::from_seed(&node_config.god_seed_bytes());

    let store = BlockStore::open(&node_config.badger.data_dir).with_context(|| {
        format!(
            "failed to open block store at {}",
            node_config.badger.data_dir.display()
        )
    })?;
    let was_empty = store.is_empty();
    Arc::new(store.clone()).spawn_gc();

    let chain = Chain::open(store, &god_key).context("failed to open chain")?;
    if was_empty {
        tracing::info!("bootstrapped a fresh genesis block");
    } else if let Some(info) = chain
        .recovery_info()
        .context("failed to inspect persisted chain state")?
    {
        tracing::info!(
            height = info.last_block_height,
            hash = %hex::encode(info.last_block_hash),
            "recovered persisted chain"
        );
    }
    let chain = Arc::new(Mutex::new(chain));

    let mempool = Arc::new(Mempool::new());
    let peers = PeerRegistry::new(cli.port.clone());
    let node_metrics = Arc::new(NodeMetrics::new());

    let validator = if is_validator {
        Some(start_validator(&cli, &node_config, &chain, &mempool, &peers)?)
    } else {
        tracing::info!(bootstrap = %config::DEFAULT_LISTEN_ADDR, "running as a peer, dialing bootstrap");
        let peers = Arc::clone(&peers);
        tokio::spawn(async move {
            peers
                .bootstrap(&[config::DEFAULT_LISTEN_ADDR.to_string()])
                .await;
        });
        None
    };

    let app_state = AppState {
        chain: Arc::clone(&chain),
        mempool: Arc::clone(&mempool),
        peers: Arc::clone(&peers),
        metrics: Arc::clone(&node_metrics),
        network: "meridian".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let metrics_updater = spawn_metrics_updater(app_state.clone(), Duration::from_secs(2));

    let rpc_bind = cli::bind_addr(&cli.port);
    let rpc_listener = tokio::net::TcpListener::bind(&rpc_bind)
        .await
        .with_context(|| format!("failed to bind RPC listener on {rpc_bind}"))?;
    tracing::info!(addr = %rpc_bind, role = if is_validator { "validator" } else { "peer" }, "RPC server listening");

    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_bind = format!("0.0.0.0:{}", cli.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_bind)
        .await
        .with_context(|| format!("failed to bind metrics listener on {metrics_bind}"))?;
    tracing::info!(addr = %metrics_bind, "metrics server listening");

    let router = api::create_router(app_state);

    tokio::select! {
        res = axum::serve(rpc_listener, router) => {
            if let Err(err) = res {
                tracing::error!(error = %err, "RPC server error");
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(err) = res {
                tracing::error!(error = %err, "metrics server error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    metrics_updater.abort();
    if let Some(v) = validator {
        v.consensus.stop();
        v.ticker.abort();
        v.finalizer.abort();
    }

    Ok(())
}

/// Loads the validator key, starts the quorum-of-one consensus engine,
/// and spawns the block-production ticker and the finalizer task that
/// drains it. Only called for the bootstrap validator.
fn start_validator(
    cli: &Cli,
    node_config: &NodeConfig,
    chain: &Arc<Mutex<Chain>>,
    mempool: &Arc<Mempool>,
    peers: &Arc<PeerRegistry>,
) -> Result<ValidatorHandles> {
    let key_path = cli.data_dir.join(config::DEFAULT_KEY_FILE);
    let validator_key = Keypair::load_from_file(&key_path).with_context(|| {
        format!(
            "failed to load validator key from {} (the bootstrap validator requires one)",
            key_path.display()
        )
    })?;
    let node_id = hex::encode(validator_key.public_key_bytes());

    let validate_chain = Arc::clone(chain);
    let (consensus, finalized_rx) = ConsensusEngine::new(
        vec![node_id.clone()],
        node_id,
        1,
        Arc::new(move |b: &Block| validate_chain.lock().validate_block(b).is_ok()),
    );
    let consensus_handle = consensus.start();

    let validator_loop = ValidatorLoop::new(
        Duration::from_secs(node_config.network.tick),
        Arc::clone(mempool),
        Arc::clone(chain),
        validator_key,
        Arc::clone(peers),
        Arc::clone(&consensus),
    );
    let ticker = validator_loop.spawn();
    let finalizer = validator_loop.spawn_finalizer(finalized_rx);
    // consensus_handle is the engine's internal event loop; distinct from
    // the ticker/finalizer tasks we hold onto for shutdown.
    drop(consensus_handle);

    tracing::info!("running as the bootstrap validator");
    Ok(ValidatorHandles {
        consensus,
        ticker,
        finalizer,
    })
}

/// Periodically mirrors live chain/mempool/peer state into the Prometheus
/// gauges and counters `/metrics` serves.
fn spawn_metrics_updater(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_height = state.chain.lock().height();
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let height = state.chain.lock().height();
            if height > last_height {
                let delta = (height - last_height) as u64;
                state.metrics.blocks_produced_total.inc_by(delta);
                state.metrics.consensus_rounds_total.inc_by(delta);
                last_height = height;
            }
            state.metrics.block_height.set(height as i64);
            state
                .metrics
                .connected_peers
                .set(state.peers.peer_count() as i64);
            state
                .metrics
                .transactions_mempool
                .set(state.mempool.len() as i64);
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
