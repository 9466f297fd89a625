//! Page layout for rendered charts
//!
//! Blocks stack top-down; a new page starts exactly when the accumulated
//! vertical offset would run past the usable page height, and the offset
//! resets. A block taller than a whole page is still placed alone at the top
//! of its own page rather than dropped.

use super::chart::{ChartBlock, DrawOp};

/// A4 portrait, in PostScript points
pub const PAGE_WIDTH: f64 = 595.0;
pub const PAGE_HEIGHT: f64 = 842.0;
pub const PAGE_MARGIN: f64 = 36.0;
/// Vertical gap between stacked blocks
pub const BLOCK_GAP: f64 = 14.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub gap: f64,
}

impl PageGeometry {
    pub fn a4() -> Self {
        Self {
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            margin: PAGE_MARGIN,
            gap: BLOCK_GAP,
        }
    }

    pub fn usable_height(&self) -> f64 {
        self.height - 2.0 * self.margin
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}

/// One laid-out page, ops already in page coordinates (top-left origin)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

/// Place blocks onto pages
pub fn paginate(blocks: &[ChartBlock], geometry: PageGeometry) -> Vec<Page> {
    let usable = geometry.usable_height();
    let mut pages = Vec::new();
    let mut current = Page::default();
    let mut offset = 0.0;

    for block in blocks {
        if offset > 0.0 && offset + block.height > usable {
            pages.push(std::mem::take(&mut current));
            offset = 0.0;
        }
        let top = geometry.margin + offset;
        current
            .ops
            .extend(block.ops.iter().map(|op| op.translated(geometry.margin, top)));
        offset += block.height + geometry.gap;
    }

    if !current.ops.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::chart::Color;

    fn geometry() -> PageGeometry {
        PageGeometry {
            width: 200.0,
            height: 200.0,
            margin: 20.0,
            gap: 10.0,
        }
    }

    fn block(height: f64) -> ChartBlock {
        ChartBlock {
            title: "t".to_string(),
            width: 100.0,
            height,
            ops: vec![DrawOp::Marker {
                x: 0.0,
                y: 0.0,
                radius: 1.0,
                color: Color::SERIES,
            }],
        }
    }

    fn marker_y(page: &Page, index: usize) -> f64 {
        match &page.ops[index] {
            DrawOp::Marker { y, .. } => *y,
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn test_blocks_stack_with_gap() {
        let pages = paginate(&[block(70.0), block(70.0)], geometry());
        assert_eq!(pages.len(), 1);
        assert_eq!(marker_y(&pages[0], 0), 20.0);
        assert_eq!(marker_y(&pages[0], 1), 100.0);
    }

    #[test]
    fn test_overflow_starts_new_page_and_resets_offset() {
        // usable height 160: third block would sit at offset 160
        let pages = paginate(&[block(70.0), block(70.0), block(70.0)], geometry());
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].ops.len(), 2);
        assert_eq!(marker_y(&pages[1], 0), 20.0);
    }

    #[test]
    fn test_exact_fit_stays_on_page() {
        // 70 + gap + 80 == usable height exactly
        let pages = paginate(&[block(70.0), block(80.0)], geometry());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].ops.len(), 2);
    }

    #[test]
    fn test_oversized_block_placed_alone_at_top() {
        let pages = paginate(&[block(50.0), block(400.0)], geometry());
        assert_eq!(pages.len(), 2);
        assert_eq!(marker_y(&pages[1], 0), 20.0);
    }

    #[test]
    fn test_no_blocks_yields_one_empty_page() {
        let pages = paginate(&[], geometry());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].ops.is_empty());
    }
}
