//! sensorview - terminal client for the sensor-node dashboard backend
//!
//! One-shot commands (`nodes`, `map`, `time-range`, `report`) fetch and
//! print; `watch` and `summary` hold a polling subscription open and print
//! each state change until Ctrl-C.

use clap::{Parser, Subcommand, ValueEnum};
use chrono::{DateTime, SecondsFormat, Utc};
use sensorview::client::{ApiClient, HttpApiClient};
use sensorview::config::AppConfig;
use sensorview::error::{Result, SensorViewError};
use sensorview::notice::{NoticeCenter, NoticeEvent};
use sensorview::poll::{ViewPhase, ViewState};
use sensorview::range::RangeSelector;
use sensorview::report::{
    ExportOutcome, ExportPhase, ReportExporter, ReportFormat, ReportRequest,
};
use sensorview::views::{
    registry_stats, DetailParams, DetailSnapshot, MapSnapshot, NodeDetailView, SummaryParams,
    SummarySnapshot, SummaryView,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

/// sensorview CLI
#[derive(Parser, Debug)]
#[command(name = "sensorview")]
#[command(about = "Polling dashboard client for sensor-node telemetry")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "SENSORVIEW_BACKEND_URL")]
    backend: Option<Url>,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known nodes with their status
    Nodes,

    /// Watch one node's readings, printing every state change
    Watch {
        node_id: String,

        /// Symbolic range: 1h, 24h, 7d, 30d or all
        #[arg(long, default_value = "24h")]
        range: String,

        /// Anchor the window at wall-clock now instead of the newest reading
        #[arg(long)]
        from_now: bool,

        /// Restrict to one sensor key
        #[arg(long)]
        sensor: Option<String>,

        /// Skip anomaly aggregation
        #[arg(long)]
        no_anomalies: bool,
    },

    /// Watch one sensor key across all nodes
    Summary {
        sensor_key: String,

        /// Symbolic range: 1h, 24h, 7d, 30d or all
        #[arg(long, default_value = "24h")]
        range: String,

        /// Anchor the window at wall-clock now instead of the newest reading
        #[arg(long)]
        from_now: bool,
    },

    /// Print node positions, falling back to configured placements
    Map,

    /// Export a CSV or PDF report for one node
    Report {
        node_id: String,

        /// RFC 3339 start bound; defaults to the node's oldest reading
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// RFC 3339 end bound; defaults to the node's newest reading
        #[arg(long)]
        end: Option<DateTime<Utc>>,

        /// Output format
        #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
        format: FormatArg,

        /// Output directory (defaults to report.out_dir from the config)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Print the oldest and newest reading timestamps for a node
    TimeRange { node_id: String },

    /// Write a starter configuration file
    InitConfig {
        /// Target path (defaults to the standard config location)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
    Csv,
    Pdf,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ReportFormat::Csv,
            FormatArg::Pdf => ReportFormat::Pdf,
        }
    }
}

impl Cli {
    /// `--debug` wins, then `RUST_LOG`, then the configured level
    fn initialize_logging(&self, default_level: &str) {
        let filter = if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
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

    if let Command::InitConfig { path } = &cli.command {
        cli.initialize_logging("info");
        let path = path.clone().unwrap_or_else(AppConfig::default_path);
        AppConfig::write_template(&path).await?;
        println!("configuration written to {}", path.display());
        return Ok(());
    }

    let mut config = AppConfig::load(cli.config.as_deref()).await?;
    cli.initialize_logging(&config.logging.level);
    if let Some(backend) = &cli.backend {
        config.backend.url = backend.clone();
    }

    let client: Arc<dyn ApiClient> = Arc::new(HttpApiClient::with_timeout(
        config.backend.url.clone(),
        config.backend.fetch_timeout,
    )?);

    match cli.command {
        Command::Nodes => run_nodes(client).await,
        Command::Watch {
            node_id,
            range,
            from_now,
            sensor,
            no_anomalies,
        } => {
            let selector = RangeSelector::from_wire(&range, Some(from_now))?;
            let params = DetailParams {
                node_id,
                selector,
                sensor,
                show_anomalies: !no_anomalies,
            };
            run_watch(client, &config, params).await
        }
        Command::Summary {
            sensor_key,
            range,
            from_now,
        } => {
            let selector = RangeSelector::from_wire(&range, Some(from_now))?;
            let params = SummaryParams {
                sensor_key,
                selector,
            };
            run_summary(client, &config, params).await
        }
        Command::Map => run_map(client, &config).await,
        Command::Report {
            node_id,
            start,
            end,
            format,
            out_dir,
        } => {
            run_report(
                client,
                &config,
                node_id,
                start,
                end,
                format.into(),
                out_dir,
            )
            .await
        }
        Command::TimeRange { node_id } => run_time_range(client, &node_id).await,
        Command::InitConfig { .. } => unreachable!("handled before config load"),
    }
}

/// One-shot node listing
async fn run_nodes(client: Arc<dyn ApiClient>) -> Result<()> {
    let nodes = client.nodes().await?;
    if nodes.is_empty() {
        println!("no nodes known to the backend");
        return Ok(());
    }

    println!("{:<16} {:<10} {:<22} SENSORS", "NODE", "STATUS", "LAST SEEN");
    for node in &nodes {
        println!(
            "{:<16} {:<10} {:<22} {}",
            node.node_id,
            node.status.to_string(),
            node.last_seen.map(rfc3339).unwrap_or_else(|| "-".to_string()),
            node.sensors.join(", "),
        );
    }

    let (total, active) = registry_stats(&nodes);
    println!("\n{total} nodes, {active} active");
    Ok(())
}

/// Poll one node until Ctrl-C
async fn run_watch(
    client: Arc<dyn ApiClient>,
    config: &AppConfig,
    params: DetailParams,
) -> Result<()> {
    info!(
        "👀 watching node {} (range {}, Ctrl-C to stop)",
        params.node_id,
        params.selector.preset.as_str(),
    );

    let view = NodeDetailView::open(client, params, config.poll_config());
    let mut states = view.watch();
    let notices = spawn_notice_printer(config);
    let mut last_error: Option<String> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow().clone();
                surface_new_error(&notices, &state.error, &mut last_error).await;
                print_detail(&state);
            }
        }
    }

    view.close();
    notices.close();
    Ok(())
}

/// Poll one sensor key across nodes until Ctrl-C
async fn run_summary(
    client: Arc<dyn ApiClient>,
    config: &AppConfig,
    params: SummaryParams,
) -> Result<()> {
    info!(
        "👀 watching sensor {} across nodes (Ctrl-C to stop)",
        params.sensor_key
    );

    let view = SummaryView::open(client, params, config.poll_config());
    let mut states = view.watch();
    let notices = spawn_notice_printer(config);
    let mut last_error: Option<String> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow().clone();
                surface_new_error(&notices, &state.error, &mut last_error).await;
                print_summary(&state);
            }
        }
    }

    view.close();
    notices.close();
    Ok(())
}

/// One-shot map snapshot from the node list plus configured placements
async fn run_map(client: Arc<dyn ApiClient>, config: &AppConfig) -> Result<()> {
    let nodes = client.nodes().await?;
    let snapshot = MapSnapshot::derive(nodes, &config.map.assigned);

    if snapshot.positions.is_empty() && snapshot.unplaced.is_empty() {
        println!("no nodes known to the backend");
        return Ok(());
    }

    for position in &snapshot.positions {
        println!(
            "{:<16} {:>9.4}, {:>9.4}  {}",
            position.node_id,
            position.location.latitude,
            position.location.longitude,
            position.status,
        );
    }
    for node_id in &snapshot.unplaced {
        println!("{node_id:<16} (no position)");
    }
    Ok(())
}

/// Export one report, defaulting bounds to the node's recorded span
async fn run_report(
    client: Arc<dyn ApiClient>,
    config: &AppConfig,
    node_id: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    format: ReportFormat,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (start, end) => {
            let range = client.time_range(&node_id).await?;
            let (first, last) = range.span().ok_or_else(|| {
                SensorViewError::invalid_input(format!(
                    "node '{node_id}' has no readings to report"
                ))
            })?;
            (start.unwrap_or(first), end.unwrap_or(last))
        }
    };

    let request = ReportRequest {
        node_id,
        start,
        end,
        format,
        out_dir: out_dir.unwrap_or_else(|| config.report.out_dir.clone()),
    };

    let exporter = ReportExporter::new(client)
        .with_boundary_margin(chrono::Duration::from_std(config.report.boundary_margin).map_err(
            |e| SensorViewError::config(format!("boundary margin out of range: {e}")),
        )?);

    let mut phases = exporter.phases();
    let progress = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            match *phases.borrow() {
                ExportPhase::Fetching => info!("fetching readings..."),
                ExportPhase::Rendering => info!("rendering charts..."),
                ExportPhase::Idle => {}
            }
        }
    });

    let outcome = exporter.export(&request).await;
    drop(exporter);
    let _ = progress.await;

    match outcome? {
        ExportOutcome::Written { path, rows } => {
            println!("wrote {} ({rows} rows)", path.display());
        }
        ExportOutcome::EmptyWindow => {
            println!("no readings in the requested window; nothing written");
        }
    }
    Ok(())
}

/// Print a node's recorded reading span
async fn run_time_range(client: Arc<dyn ApiClient>, node_id: &str) -> Result<()> {
    let range = client.time_range(node_id).await?;
    match range.span() {
        Some((first, last)) => {
            let span = last - first;
            println!(
                "{}: {} .. {} ({})",
                range.node_id,
                rfc3339(first),
                rfc3339(last),
                human_span(span),
            );
        }
        None => println!("{}: no readings recorded", range.node_id),
    }
    Ok(())
}

/// Echo posted toasts to stderr until the center closes
fn spawn_notice_printer(config: &AppConfig) -> NoticeCenter {
    let notices = NoticeCenter::new(config.notices.ttl);
    let mut events = notices.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let NoticeEvent::Posted(notice) = event {
                eprintln!("⚠ {}", notice.message);
            }
        }
    });
    notices
}

/// Post a toast when the poll error message changes
async fn surface_new_error(
    notices: &NoticeCenter,
    error: &Option<String>,
    last_error: &mut Option<String>,
) {
    if error != last_error {
        if let Some(message) = error {
            notices.push_error(message.clone()).await;
        }
        *last_error = error.clone();
    }
}

fn print_detail(state: &ViewState<DetailSnapshot>) {
    match state.phase {
        ViewPhase::Loading => println!("loading..."),
        ViewPhase::Failed => println!(
            "failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        ),
        ViewPhase::Ready => {
            let Some(snapshot) = &state.data else {
                return;
            };
            let mut line = format!(
                "{} {:>3} readings",
                if state.updating { "~" } else { " " },
                snapshot.readings.len(),
            );
            for (key, point) in &snapshot.latest {
                line.push_str(&format!("  {key}={}", point.value));
            }
            if let Some(anomalies) = &snapshot.anomalies {
                line.push_str(&format!("  anomalies={}", anomalies.total));
            }
            println!("{line}");
        }
    }
}

fn print_summary(state: &ViewState<SummarySnapshot>) {
    match state.phase {
        ViewPhase::Loading => println!("loading..."),
        ViewPhase::Failed => println!(
            "failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        ),
        ViewPhase::Ready => {
            let Some(snapshot) = &state.data else {
                return;
            };
            if snapshot.is_empty() {
                println!("no data for sensor {}", snapshot.sensor_key);
                return;
            }
            let mut line = format!("{} {}", if state.updating { "~" } else { " " }, snapshot.sensor_key);
            for node_id in &snapshot.node_ids {
                if let Some(point) = snapshot.per_node.get(node_id).and_then(|s| s.last()) {
                    line.push_str(&format!("  {node_id}={}", point.value));
                }
            }
            println!("{line}");
        }
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn human_span(span: chrono::Duration) -> String {
    let days = span.num_days();
    let hours = span.num_hours() % 24;
    let minutes = span.num_minutes() % 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
