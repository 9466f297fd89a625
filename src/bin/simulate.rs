//! sensorview-simulate - in-memory development backend
//!
//! Seeds a few nodes with reproducible history, keeps appending fresh
//! readings on an interval, and serves the REST surface the dashboard
//! client consumes. Everything lives in memory; restarting resets it.

use clap::Parser;
use sensorview::error::Result;
use sensorview::simulator::{run_generator, seed_history, GeneratorConfig, MemoryStore};
use sensorview::simulator::server;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sensorview-simulate")]
#[command(about = "In-memory sensor backend for local dashboard development")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = 8000, env = "SENSORVIEW_SIM_PORT")]
    port: u16,

    /// Seconds between generated readings
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// RNG seed; the same seed reproduces the same history
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Probability of an anomalous value per sensor in continuous mode
    #[arg(long, default_value_t = 0.05)]
    anomaly_rate: f64,

    /// Historical readings to seed per node before serving
    #[arg(long, default_value_t = 120)]
    populate: usize,

    /// Inject exactly COUNT historical anomalies for a sensor, e.g. pH=3.
    /// May be repeated.
    #[arg(long = "inject", value_name = "KEY=COUNT", value_parser = parse_injection)]
    injections: Vec<(String, usize)>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn parse_injection(raw: &str) -> std::result::Result<(String, usize), String> {
    let (key, count) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=COUNT, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty sensor key in '{raw}'"));
    }
    let count = count
        .parse::<usize>()
        .map_err(|e| format!("bad count in '{raw}': {e}"))?;
    Ok((key.to_string(), count))
}

impl Cli {
    fn initialize_logging(&self) {
        let filter = if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.initialize_logging();

    let config = GeneratorConfig {
        seed: cli.seed,
        anomaly_rate: cli.anomaly_rate,
        ..GeneratorConfig::default()
    };
    let counts: BTreeMap<String, usize> = cli.injections.iter().cloned().collect();

    info!("🚀 starting simulator (seed {})", cli.seed);
    let store = MemoryStore::new();
    seed_history(&store, &config, cli.populate, &counts).await;

    let token = CancellationToken::new();
    let generator = tokio::spawn(run_generator(
        store.clone(),
        config,
        Duration::from_secs(cli.interval),
        token.clone(),
    ));

    let addr = SocketAddr::new(cli.host, cli.port);
    let server = tokio::spawn(server::serve(store, addr, token.clone()));

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    token.cancel();

    generator.await.ok();
    match server.await {
        Ok(result) => result,
        Err(_) => Ok(()),
    }
}
