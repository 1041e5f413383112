//! tickbridge-connector: real-time crypto market data bridge
//!
//! Subscribes to the Polygon crypto WebSocket feed and republishes
//! normalized OHLCV records to NATS, keyed per trading pair.

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tickbridge_connector_lib::{
    config, OverflowPolicy, PolygonConnector, PublisherBridge, Runner,
};

#[derive(Parser, Debug)]
#[command(name = "tickbridge-connector")]
#[command(about = "Polygon crypto feed to NATS bridge")]
struct Args {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = config::DEFAULT_NATS_URL)]
    nats_url: String,

    /// Logical stream the records are published under
    #[arg(long, env = "TICKBRIDGE_TOPIC", default_value = config::DEFAULT_TOPIC)]
    topic: String,

    /// Comma-separated pairs to subscribe aggregates for (default: all pairs)
    #[arg(long, env = "TICKBRIDGE_PAIRS")]
    pairs: Option<String>,

    /// Comma-separated raw topic patterns (e.g. "XA.*,XL2.*"); overrides --pairs
    #[arg(long, env = "TICKBRIDGE_PATTERNS")]
    patterns: Option<String>,

    /// Polygon WebSocket URL override
    #[arg(long, env = "POLYGON_WS_URL")]
    ws_url: Option<String>,

    /// Cap on unacknowledged publishes
    #[arg(long, env = "TICKBRIDGE_MAX_IN_FLIGHT", default_value_t = 1024)]
    max_in_flight: usize,

    /// What to do with new records at the cap: "block" or "drop-new"
    #[arg(long, env = "TICKBRIDGE_OVERFLOW_POLICY", default_value = "block")]
    overflow_policy: OverflowPolicy,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Required credential; missing key is fatal at startup
    let api_key = config::polygon_api_key().map_err(|e| {
        error!(error = %e, "Feed credentials missing");
        e
    })?;

    let connector = if let Some(ref raw) = args.patterns {
        let patterns = config::parse_patterns(raw);
        let mut connector = PolygonConnector::new(api_key, args.ws_url.clone());
        connector.subscribe(&patterns)?;
        info!(patterns = ?connector.patterns(), "Subscribing to explicit patterns");
        connector
    } else if let Some(ref pairs) = args.pairs {
        let pairs = config::parse_patterns(pairs);
        info!(pairs = ?pairs, "Subscribing to aggregates for explicit pairs");
        PolygonConnector::crypto_pairs(api_key, args.ws_url.clone(), &pairs)
    } else {
        info!("Subscribing to aggregates for all crypto pairs");
        PolygonConnector::all_crypto_aggregates(api_key, args.ws_url.clone())
    };

    let bridge = PublisherBridge::new(
        &args.nats_url,
        &args.topic,
        args.max_in_flight,
        args.overflow_policy,
    );

    // Connect the producer up front; a broker outage here is not fatal,
    // records fail individually until it resolves.
    match bridge.ensure_ready().await {
        Ok(_) => info!(url = %args.nats_url, topic = %args.topic, "Broker connection ready"),
        Err(e) => warn!(url = %args.nats_url, error = %e, "Broker not reachable yet, publishing will retry on first use"),
    }

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send(true).ok();
    });

    let mut runner = Runner::new("polygon-crypto", connector, bridge);
    match runner.run(shutdown_rx).await {
        Ok(()) => {
            info!("Connector stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Connector error");
            std::process::exit(1);
        }
    }
}
