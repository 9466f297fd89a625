//! Report export
//!
//! Fetches a bounded reading window for one node and writes either a CSV
//! table or a paginated PDF chart document. Progress is observable through a
//! watch channel: `Idle → Fetching → (Rendering, PDF only) → Idle`, with
//! `Fetching` returning straight to `Idle` on an empty window or fetch error.
//! PDF serialization starts only once every chart future has resolved; there
//! is no delay-based readiness anywhere.

pub mod chart;
pub mod csv;
pub mod layout;
pub mod pdf;

use crate::client::{ApiClient, ReadingsQuery};
use crate::error::{Result, SensorViewError};
use crate::model::Reading;
use crate::pipeline;
use crate::validation::validate_node_id;
use chart::{ChartRenderer, ChartSpec, LineChartRenderer};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use futures::future::join_all;
use layout::PageGeometry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Default slack past the end bound searched for one boundary reading
pub const DEFAULT_BOUNDARY_MARGIN_MINUTES: i64 = 60;

/// Observable export phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    Fetching,
    Rendering,
}

/// Output flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Pdf,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Pdf => "pdf",
        }
    }
}

/// One export job
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub node_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub format: ReportFormat,
    pub out_dir: PathBuf,
}

/// What an export produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written { path: PathBuf, rows: usize },
    /// No readings in the window; nothing was written
    EmptyWindow,
}

pub struct ReportExporter {
    client: Arc<dyn ApiClient>,
    renderer: Arc<dyn ChartRenderer>,
    geometry: PageGeometry,
    boundary_margin: Duration,
    phase_tx: watch::Sender<ExportPhase>,
}

impl ReportExporter {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        let (phase_tx, _) = watch::channel(ExportPhase::Idle);
        Self {
            client,
            renderer: Arc::new(LineChartRenderer::new()),
            geometry: PageGeometry::a4(),
            boundary_margin: Duration::minutes(DEFAULT_BOUNDARY_MARGIN_MINUTES),
            phase_tx,
        }
    }

    /// Swap the chart backend
    pub fn with_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Adjust how far past the end bound the boundary reading may sit
    pub fn with_boundary_margin(mut self, margin: Duration) -> Self {
        self.boundary_margin = margin;
        self
    }

    /// Observe export phases
    pub fn phases(&self) -> watch::Receiver<ExportPhase> {
        self.phase_tx.subscribe()
    }

    /// Run one export; the phase always lands back on `Idle`
    pub async fn export(&self, request: &ReportRequest) -> Result<ExportOutcome> {
        let outcome = self.run(request).await;
        self.phase_tx.send_replace(ExportPhase::Idle);
        outcome
    }

    async fn run(&self, request: &ReportRequest) -> Result<ExportOutcome> {
        validate_node_id(&request.node_id)?;
        if request.start > request.end {
            return Err(SensorViewError::invalid_input(format!(
                "report start {} is after end {}",
                rfc3339(request.start),
                rfc3339(request.end),
            )));
        }

        self.phase_tx.send_replace(ExportPhase::Fetching);
        let window = ReadingsQuery::with_bounds(request.start, request.end);
        let mut readings = self.client.readings(&request.node_id, &window).await?;
        if readings.is_empty() {
            debug!(node_id = %request.node_id, "export window is empty, nothing written");
            return Ok(ExportOutcome::EmptyWindow);
        }

        if let Some(boundary) = self.boundary_reading(&request.node_id, request.end).await? {
            readings.push(boundary);
        }

        let rows = readings.len();
        let bytes = match request.format {
            ReportFormat::Csv => csv::csv_bytes(&readings)?,
            ReportFormat::Pdf => {
                self.phase_tx.send_replace(ExportPhase::Rendering);
                self.render_document(&readings).await?
            }
        };

        let path = request.out_dir.join(report_filename(
            &request.node_id,
            request.start,
            request.end,
            request.format,
        ));
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), rows, "report written");
        Ok(ExportOutcome::Written { path, rows })
    }

    /// One reading just past the end bound keeps the right edge of charts
    /// and tables from looking clipped
    async fn boundary_reading(
        &self,
        node_id: &str,
        end: DateTime<Utc>,
    ) -> Result<Option<Reading>> {
        let probe = ReadingsQuery::with_bounds(end, end + self.boundary_margin);
        let mut extra = self.client.readings(node_id, &probe).await?;
        extra.retain(|r| r.timestamp > end);
        extra.sort_by_key(|r| r.timestamp);
        Ok(extra.into_iter().next())
    }

    async fn render_document(&self, readings: &[Reading]) -> Result<Vec<u8>> {
        let keys = pipeline::sensor_key_union(readings);
        let anomalies = pipeline::aggregate_anomalies(readings);

        let specs: Vec<ChartSpec> = keys
            .iter()
            .map(|key| {
                ChartSpec::new(
                    key.clone(),
                    pipeline::series_for(readings, key),
                    anomalies.per_sensor.get(key).cloned().unwrap_or_default(),
                )
            })
            .collect();

        let rendered = join_all(specs.iter().map(|spec| self.renderer.render(spec))).await;
        let mut blocks = Vec::with_capacity(rendered.len());
        for block in rendered {
            blocks.push(block?);
        }

        let pages = layout::paginate(&blocks, self.geometry);
        Ok(pdf::render_pdf(&pages, self.geometry))
    }
}

/// `report_{node}_{start}_{end}.{csv|pdf}`; `:` and `+` never survive
/// sanitization
pub fn report_filename(
    node_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    format: ReportFormat,
) -> String {
    format!(
        "report_{}_{}_{}.{}",
        node_id,
        sanitize_bound(start),
        sanitize_bound(end),
        format.extension(),
    )
}

fn sanitize_bound(ts: DateTime<Utc>) -> String {
    rfc3339(ts).replace([':', '+'], "-")
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
