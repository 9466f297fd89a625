//! Minimal PDF 1.4 writer
//!
//! Serializes laid-out pages of draw ops into a self-contained document:
//! base-14 Helvetica for text, uncompressed content streams, one content
//! stream per page, and a correct xref table. Layout coordinates use a
//! top-left origin; this writer flips y into PDF's bottom-left space.

use super::chart::{Color, DrawOp};
use super::layout::{Page, PageGeometry};

/// Bézier control distance for a quarter circle of radius 1
const CIRCLE_K: f64 = 0.552_284_749_831;

/// Serialize pages into a complete PDF document
pub fn render_pdf(pages: &[Page], geometry: PageGeometry) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let total_objects = 3 + pages.len() * 2;
    let mut offsets: Vec<usize> = Vec::with_capacity(total_objects);

    // Object 1: catalog
    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    // Object 2: page tree; page objects are interleaved with their streams
    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj\n<< /Type /Pages /Kids [{kids}] /Count {} >>\nendobj\n",
            pages.len()
        )
        .as_bytes(),
    );

    // Object 3: the only font
    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>\nendobj\n",
    );

    for (i, page) in pages.iter().enumerate() {
        let page_id = 4 + 2 * i;
        let content_id = page_id + 1;

        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{page_id} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>\nendobj\n",
                num(geometry.width),
                num(geometry.height),
            )
            .as_bytes(),
        );

        let stream = content_stream(page, geometry.height);
        offsets.push(out.len());
        out.extend_from_slice(
            format!("{content_id} 0 obj\n<< /Length {} >>\nstream\n", stream.len()).as_bytes(),
        );
        out.extend_from_slice(stream.as_bytes());
        out.extend_from_slice(b"endstream\nendobj\n");
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", total_objects + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            total_objects + 1
        )
        .as_bytes(),
    );
    out
}

fn content_stream(page: &Page, page_height: f64) -> String {
    let mut s = String::new();
    for op in &page.ops {
        match op {
            DrawOp::Polyline {
                points,
                color,
                width,
            } => {
                if points.len() < 2 {
                    continue;
                }
                s.push_str(&format!("{} RG\n{} w\n", rgb(*color), num(*width)));
                for (i, (x, y)) in points.iter().enumerate() {
                    let verb = if i == 0 { "m" } else { "l" };
                    s.push_str(&format!("{} {} {verb}\n", num(*x), num(page_height - y)));
                }
                s.push_str("S\n");
            }
            DrawOp::Line {
                from,
                to,
                color,
                width,
            } => {
                s.push_str(&format!(
                    "{} RG\n{} w\n{} {} m\n{} {} l\nS\n",
                    rgb(*color),
                    num(*width),
                    num(from.0),
                    num(page_height - from.1),
                    num(to.0),
                    num(page_height - to.1),
                ));
            }
            DrawOp::Marker {
                x,
                y,
                radius,
                color,
            } => {
                s.push_str(&format!("{} rg\n", rgb(*color)));
                circle_path(&mut s, *x, page_height - y, *radius);
                s.push_str("f\n");
            }
            DrawOp::Text {
                x,
                y,
                size,
                content,
                color,
            } => {
                s.push_str(&format!(
                    "BT\n/F1 {} Tf\n{} rg\n{} {} Td\n({}) Tj\nET\n",
                    num(*size),
                    rgb(*color),
                    num(*x),
                    num(page_height - y),
                    escape_text(content),
                ));
            }
        }
    }
    s
}

/// Four Bézier arcs approximating a circle, starting at the rightmost point
fn circle_path(s: &mut String, x: f64, y: f64, r: f64) {
    let k = CIRCLE_K * r;
    s.push_str(&format!("{} {} m\n", num(x + r), num(y)));
    s.push_str(&format!(
        "{} {} {} {} {} {} c\n",
        num(x + r),
        num(y + k),
        num(x + k),
        num(y + r),
        num(x),
        num(y + r),
    ));
    s.push_str(&format!(
        "{} {} {} {} {} {} c\n",
        num(x - k),
        num(y + r),
        num(x - r),
        num(y + k),
        num(x - r),
        num(y),
    ));
    s.push_str(&format!(
        "{} {} {} {} {} {} c\n",
        num(x - r),
        num(y - k),
        num(x - k),
        num(y - r),
        num(x),
        num(y - r),
    ));
    s.push_str(&format!(
        "{} {} {} {} {} {} c\n",
        num(x + k),
        num(y - r),
        num(x + r),
        num(y - k),
        num(x + r),
        num(y),
    ));
}

fn num(v: f64) -> String {
    format!("{v:.2}")
}

fn rgb(color: Color) -> String {
    format!("{:.3} {:.3} {:.3}", color.r, color.g, color.b)
}

/// Escape the three characters with meaning inside a PDF string literal
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_op(content: &str, x: f64, y: f64) -> DrawOp {
        DrawOp::Text {
            x,
            y,
            size: 10.0,
            content: content.to_string(),
            color: Color::BLACK,
        }
    }

    fn small_geometry() -> PageGeometry {
        PageGeometry {
            width: 300.0,
            height: 200.0,
            margin: 10.0,
            gap: 5.0,
        }
    }

    #[test]
    fn test_document_frame() {
        let pages = vec![Page::default()];
        let bytes = render_pdf(&pages, small_geometry());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("/Type /Catalog"));
        assert!(text.contains("/BaseFont /Helvetica"));
    }

    #[test]
    fn test_page_tree_counts_pages() {
        let pages = vec![Page::default(), Page::default()];
        let text = String::from_utf8(render_pdf(&pages, small_geometry())).unwrap();
        assert!(text.contains("/Count 2"));
        assert_eq!(text.matches("/Type /Page /Parent").count(), 2);
    }

    #[test]
    fn test_text_is_escaped() {
        let pages = vec![Page {
            ops: vec![text_op("pH (2 anomalies)", 5.0, 5.0)],
        }];
        let text = String::from_utf8(render_pdf(&pages, small_geometry())).unwrap();
        assert!(text.contains("(pH \\(2 anomalies\\)) Tj"));
    }

    #[test]
    fn test_text_blocks_are_balanced() {
        let pages = vec![
            Page {
                ops: vec![text_op("pH", 5.0, 5.0), text_op("turbidity", 5.0, 25.0)],
            },
            Page {
                ops: vec![text_op("temperature", 5.0, 5.0)],
            },
        ];
        let text = String::from_utf8(render_pdf(&pages, small_geometry())).unwrap();
        assert_eq!(text.matches("BT\n").count(), 3);
        assert_eq!(text.matches("ET\n").count(), 3);
    }

    #[test]
    fn test_y_axis_is_flipped() {
        let pages = vec![Page {
            ops: vec![text_op("x", 10.0, 50.0)],
        }];
        let text = String::from_utf8(render_pdf(&pages, small_geometry())).unwrap();
        assert!(text.contains("10.00 150.00 Td"));
    }

    #[test]
    fn test_stream_length_matches_content() {
        let pages = vec![Page {
            ops: vec![DrawOp::Line {
                from: (0.0, 0.0),
                to: (10.0, 10.0),
                color: Color::AXIS,
                width: 1.0,
            }],
        }];
        let text = String::from_utf8(render_pdf(&pages, small_geometry())).unwrap();

        let length_at = text.find("/Length ").unwrap() + "/Length ".len();
        let length: usize = text[length_at..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap();
        let data_start = text.find("stream\n").unwrap() + "stream\n".len();
        let data_end = text.find("endstream").unwrap();
        assert_eq!(length, data_end - data_start);
    }

    #[test]
    fn test_startxref_points_at_xref_table() {
        let pages = vec![Page::default()];
        let bytes = render_pdf(&pages, small_geometry());
        let text = String::from_utf8(bytes.clone()).unwrap();

        let at = text.find("startxref\n").unwrap() + "startxref\n".len();
        let offset: usize = text[at..].lines().next().unwrap().parse().unwrap();
        assert!(bytes[offset..].starts_with(b"xref\n"));
    }

    #[test]
    fn test_xref_entries_are_twenty_bytes() {
        let pages = vec![Page::default()];
        let text = String::from_utf8(render_pdf(&pages, small_geometry())).unwrap();

        let table_at = text.rfind("\nxref\n").unwrap() + 1;
        let entries = text[table_at..]
            .lines()
            .skip(2)
            .take_while(|line| line.ends_with("f ") || line.ends_with("n "));
        for entry in entries {
            assert_eq!(entry.len() + 1, 20, "entry {entry:?}");
        }
    }

    #[test]
    fn test_marker_emits_four_curves_and_fill() {
        let pages = vec![Page {
            ops: vec![DrawOp::Marker {
                x: 20.0,
                y: 20.0,
                radius: 2.5,
                color: Color::ANOMALY,
            }],
        }];
        let text = String::from_utf8(render_pdf(&pages, small_geometry())).unwrap();
        let stream_at = text.find("stream\n").unwrap();
        let stream = &text[stream_at..text.find("endstream").unwrap()];
        assert_eq!(stream.matches(" c\n").count(), 4);
        assert!(stream.contains("f\n"));
    }
}
