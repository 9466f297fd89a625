//! Chart description and rendering
//!
//! Charts are rendered into backend-agnostic draw operations in block-local
//! coordinates (origin top-left, y growing downward). The PDF writer owns the
//! flip into PDF page space. Rendering is an async trait call; the returned
//! future resolving is the readiness signal the exporter waits on before it
//! serializes anything.

use crate::error::Result;
use crate::model::SeriesPoint;
use async_trait::async_trait;

/// Default chart width, sized to the usable A4 width
pub const DEFAULT_CHART_WIDTH: f64 = 523.0;
/// Default chart height including title and axis labels
pub const DEFAULT_CHART_HEIGHT: f64 = 170.0;

const TITLE_SIZE: f64 = 10.0;
const LABEL_SIZE: f64 = 7.0;
const PLOT_LEFT: f64 = 46.0;
const PLOT_TOP: f64 = 18.0;
const PLOT_RIGHT_PAD: f64 = 6.0;
const PLOT_BOTTOM_PAD: f64 = 22.0;
const Y_TICKS: usize = 5;
const X_TICKS: usize = 3;
const MARKER_RADIUS: f64 = 2.5;

/// RGB colour with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const AXIS: Color = Color::new(0.45, 0.45, 0.45);
    pub const SERIES: Color = Color::new(0.27, 0.51, 0.71);
    pub const ANOMALY: Color = Color::new(0.80, 0.16, 0.16);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

/// One drawing primitive in block-local coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Connected segments through `points`
    Polyline {
        points: Vec<(f64, f64)>,
        color: Color,
        width: f64,
    },
    /// Filled circle
    Marker {
        x: f64,
        y: f64,
        radius: f64,
        color: Color,
    },
    /// Single line of text, anchored at the baseline start
    Text {
        x: f64,
        y: f64,
        size: f64,
        content: String,
        color: Color,
    },
    /// Straight segment
    Line {
        from: (f64, f64),
        to: (f64, f64),
        color: Color,
        width: f64,
    },
}

impl DrawOp {
    /// Shift the op by `(dx, dy)`; used when a block is placed on a page
    pub fn translated(&self, dx: f64, dy: f64) -> DrawOp {
        match self {
            DrawOp::Polyline {
                points,
                color,
                width,
            } => DrawOp::Polyline {
                points: points.iter().map(|(x, y)| (x + dx, y + dy)).collect(),
                color: *color,
                width: *width,
            },
            DrawOp::Marker {
                x,
                y,
                radius,
                color,
            } => DrawOp::Marker {
                x: x + dx,
                y: y + dy,
                radius: *radius,
                color: *color,
            },
            DrawOp::Text {
                x,
                y,
                size,
                content,
                color,
            } => DrawOp::Text {
                x: x + dx,
                y: y + dy,
                size: *size,
                content: content.clone(),
                color: *color,
            },
            DrawOp::Line {
                from,
                to,
                color,
                width,
            } => DrawOp::Line {
                from: (from.0 + dx, from.1 + dy),
                to: (to.0 + dx, to.1 + dy),
                color: *color,
                width: *width,
            },
        }
    }
}

/// A rendered chart: a titled box of draw ops with a fixed footprint
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBlock {
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub ops: Vec<DrawOp>,
}

/// Input for one chart: a sensor's series plus its anomaly points
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub sensor_key: String,
    pub series: Vec<SeriesPoint>,
    pub anomalies: Vec<SeriesPoint>,
    pub width: f64,
    pub height: f64,
}

impl ChartSpec {
    pub fn new(
        sensor_key: impl Into<String>,
        series: Vec<SeriesPoint>,
        anomalies: Vec<SeriesPoint>,
    ) -> Self {
        Self {
            sensor_key: sensor_key.into(),
            series,
            anomalies,
            width: DEFAULT_CHART_WIDTH,
            height: DEFAULT_CHART_HEIGHT,
        }
    }
}

/// Chart rendering seam
///
/// Implementations must not hand back a block before it is complete; the
/// exporter treats the resolved future as the only readiness acknowledgment.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, spec: &ChartSpec) -> Result<ChartBlock>;
}

/// Built-in vector line chart
#[derive(Debug, Clone, Copy, Default)]
pub struct LineChartRenderer;

impl LineChartRenderer {
    pub fn new() -> Self {
        Self
    }

    fn title_for(spec: &ChartSpec) -> String {
        match spec.anomalies.len() {
            0 => spec.sensor_key.clone(),
            1 => format!("{} (1 anomaly)", spec.sensor_key),
            n => format!("{} ({n} anomalies)", spec.sensor_key),
        }
    }
}

#[async_trait]
impl ChartRenderer for LineChartRenderer {
    async fn render(&self, spec: &ChartSpec) -> Result<ChartBlock> {
        let title = Self::title_for(spec);
        let mut ops = vec![DrawOp::Text {
            x: 0.0,
            y: TITLE_SIZE,
            size: TITLE_SIZE,
            content: title.clone(),
            color: Color::BLACK,
        }];

        let plot_right = spec.width - PLOT_RIGHT_PAD;
        let plot_bottom = spec.height - PLOT_BOTTOM_PAD;

        if spec.series.is_empty() {
            ops.push(DrawOp::Text {
                x: PLOT_LEFT,
                y: (PLOT_TOP + plot_bottom) / 2.0,
                size: LABEL_SIZE + 1.0,
                content: "no data in range".to_string(),
                color: Color::AXIS,
            });
            return Ok(ChartBlock {
                title,
                width: spec.width,
                height: spec.height,
                ops,
            });
        }

        let mut series = spec.series.clone();
        series.sort_by_key(|p| p.timestamp);

        let values = series
            .iter()
            .map(|p| p.value)
            .chain(spec.anomalies.iter().map(|p| p.value));
        let mut vmin = f64::INFINITY;
        let mut vmax = f64::NEG_INFINITY;
        for v in values {
            vmin = vmin.min(v);
            vmax = vmax.max(v);
        }
        if (vmax - vmin).abs() < f64::EPSILON {
            vmin -= 1.0;
            vmax += 1.0;
        }

        let t0 = series[0].timestamp.timestamp_millis() as f64;
        let t1 = series[series.len() - 1].timestamp.timestamp_millis() as f64;
        let t_span = t1 - t0;

        let x_at = |ts_millis: f64| -> f64 {
            if t_span <= 0.0 {
                (PLOT_LEFT + plot_right) / 2.0
            } else {
                PLOT_LEFT + (ts_millis - t0) / t_span * (plot_right - PLOT_LEFT)
            }
        };
        let y_at = |value: f64| -> f64 {
            plot_bottom - (value - vmin) / (vmax - vmin) * (plot_bottom - PLOT_TOP)
        };

        // Axes
        ops.push(DrawOp::Line {
            from: (PLOT_LEFT, PLOT_TOP),
            to: (PLOT_LEFT, plot_bottom),
            color: Color::AXIS,
            width: 0.8,
        });
        ops.push(DrawOp::Line {
            from: (PLOT_LEFT, plot_bottom),
            to: (plot_right, plot_bottom),
            color: Color::AXIS,
            width: 0.8,
        });

        // Value ticks up the left edge
        for i in 0..Y_TICKS {
            let frac = i as f64 / (Y_TICKS - 1) as f64;
            let value = vmin + frac * (vmax - vmin);
            let y = y_at(value);
            ops.push(DrawOp::Line {
                from: (PLOT_LEFT - 3.0, y),
                to: (PLOT_LEFT, y),
                color: Color::AXIS,
                width: 0.8,
            });
            ops.push(DrawOp::Text {
                x: 2.0,
                y: y + LABEL_SIZE / 2.0,
                size: LABEL_SIZE,
                content: format_value(value),
                color: Color::AXIS,
            });
        }

        // Time ticks along the bottom
        for i in 0..X_TICKS {
            let frac = i as f64 / (X_TICKS - 1) as f64;
            let ts_millis = t0 + frac * t_span.max(0.0);
            let x = x_at(ts_millis);
            let ts = series[0].timestamp
                + chrono::Duration::milliseconds((frac * t_span.max(0.0)) as i64);
            let label = ts.format("%m-%d %H:%M").to_string();
            ops.push(DrawOp::Line {
                from: (x, plot_bottom),
                to: (x, plot_bottom + 3.0),
                color: Color::AXIS,
                width: 0.8,
            });
            ops.push(DrawOp::Text {
                x: x - text_width_estimate(&label, LABEL_SIZE) / 2.0,
                y: plot_bottom + 13.0,
                size: LABEL_SIZE,
                content: label,
                color: Color::AXIS,
            });
        }

        // The series itself; a single point gets a marker since a one-point
        // polyline draws nothing
        if series.len() == 1 {
            ops.push(DrawOp::Marker {
                x: x_at(t0),
                y: y_at(series[0].value),
                radius: MARKER_RADIUS,
                color: Color::SERIES,
            });
        } else {
            let points = series
                .iter()
                .map(|p| (x_at(p.timestamp.timestamp_millis() as f64), y_at(p.value)))
                .collect();
            ops.push(DrawOp::Polyline {
                points,
                color: Color::SERIES,
                width: 1.2,
            });
        }

        for anomaly in &spec.anomalies {
            ops.push(DrawOp::Marker {
                x: x_at(anomaly.timestamp.timestamp_millis() as f64),
                y: y_at(anomaly.value),
                radius: MARKER_RADIUS,
                color: Color::ANOMALY,
            });
        }

        Ok(ChartBlock {
            title,
            width: spec.width,
            height: spec.height,
            ops,
        })
    }
}

fn format_value(value: f64) -> String {
    if value.abs() >= 100.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

fn text_width_estimate(text: &str, size: f64) -> f64 {
    text.len() as f64 * size * 0.6
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn point(minute: u32, value: f64) -> SeriesPoint {
        SeriesPoint::new(
            Utc.with_ymd_and_hms(2025, 3, 14, 9, minute, 0).unwrap(),
            value,
        )
    }

    async fn render(spec: &ChartSpec) -> ChartBlock {
        LineChartRenderer::new().render(spec).await.unwrap()
    }

    fn polyline_points(block: &ChartBlock) -> Vec<(f64, f64)> {
        block
            .ops
            .iter()
            .find_map(|op| match op {
                DrawOp::Polyline { points, .. } => Some(points.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn markers_with(block: &ChartBlock, color: Color) -> usize {
        block
            .ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Marker { color: c, .. } if *c == color))
            .count()
    }

    #[tokio::test]
    async fn test_block_footprint_matches_spec() {
        let spec = ChartSpec::new("pH", vec![point(0, 7.0), point(5, 7.2)], vec![]);
        let block = render(&spec).await;
        assert_eq!(block.width, DEFAULT_CHART_WIDTH);
        assert_eq!(block.height, DEFAULT_CHART_HEIGHT);
    }

    #[tokio::test]
    async fn test_title_carries_anomaly_count() {
        let series = vec![point(0, 7.0), point(5, 9.4)];
        let one = ChartSpec::new("pH", series.clone(), vec![point(5, 9.4)]);
        assert_eq!(render(&one).await.title, "pH (1 anomaly)");

        let two = ChartSpec::new("pH", series.clone(), vec![point(5, 9.4), point(0, 7.0)]);
        assert_eq!(render(&two).await.title, "pH (2 anomalies)");

        let none = ChartSpec::new("pH", series, vec![]);
        assert_eq!(render(&none).await.title, "pH");
    }

    #[tokio::test]
    async fn test_empty_series_renders_placeholder() {
        let block = render(&ChartSpec::new("pH", vec![], vec![])).await;
        assert!(polyline_points(&block).is_empty());
        assert!(block.ops.iter().any(
            |op| matches!(op, DrawOp::Text { content, .. } if content == "no data in range")
        ));
    }

    #[tokio::test]
    async fn test_points_scaled_into_plot_area() {
        let spec = ChartSpec::new(
            "flowRate",
            vec![point(0, 60.0), point(5, 280.0), point(10, 155.0)],
            vec![],
        );
        let block = render(&spec).await;
        for (x, y) in polyline_points(&block) {
            assert!(x >= PLOT_LEFT && x <= spec.width - PLOT_RIGHT_PAD);
            assert!(y >= PLOT_TOP && y <= spec.height - PLOT_BOTTOM_PAD);
        }
    }

    #[tokio::test]
    async fn test_single_point_becomes_marker() {
        let block = render(&ChartSpec::new("pH", vec![point(0, 7.0)], vec![])).await;
        assert!(polyline_points(&block).is_empty());
        assert_eq!(markers_with(&block, Color::SERIES), 1);
    }

    #[tokio::test]
    async fn test_anomaly_markers_match_count() {
        let spec = ChartSpec::new(
            "pH",
            vec![point(0, 7.0), point(5, 9.4), point(10, 7.1)],
            vec![point(5, 9.4)],
        );
        assert_eq!(markers_with(&render(&spec).await, Color::ANOMALY), 1);
    }

    #[tokio::test]
    async fn test_flat_series_pads_value_range() {
        let spec = ChartSpec::new("pH", vec![point(0, 7.0), point(5, 7.0)], vec![]);
        let block = render(&spec).await;
        let points = polyline_points(&block);
        assert_eq!(points.len(), 2);
        for (_, y) in points {
            assert!(y.is_finite());
        }
    }

    #[test]
    fn test_translated_shifts_every_op() {
        let op = DrawOp::Marker {
            x: 10.0,
            y: 20.0,
            radius: 2.0,
            color: Color::SERIES,
        };
        match op.translated(5.0, 7.0) {
            DrawOp::Marker { x, y, .. } => {
                assert_eq!(x, 15.0);
                assert_eq!(y, 27.0);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }
}
