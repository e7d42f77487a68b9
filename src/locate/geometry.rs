//! Highlight geometry
//!
//! Merges per-glyph or per-word quads into one band per visual line, so a
//! multi-word value is highlighted as continuous strips instead of a box
//! per word or one box spanning the whole block.

use crate::document::{Quad, Rect};

/// Merge quads given in reading order into per-line rectangles
///
/// A rectangle joins the current line when its vertical center lies
/// strictly between the line's top and bottom edges. Quads with missing
/// coordinates are skipped.
pub fn merge_to_lines(quads: &[Quad]) -> Vec<Rect> {
    let mut lines = Vec::new();
    let mut current: Option<Rect> = None;

    for rect in quads.iter().filter(|q| q.is_valid()).map(Quad::to_rect) {
        match current.as_mut() {
            Some(line) => {
                let center = rect.center();
                if line.y1 < center.y && line.y2 > center.y {
                    line.x2 = line.x2.max(rect.x2);
                    line.y2 = line.y2.max(rect.y2);
                } else {
                    lines.push(*line);
                    current = Some(rect);
                }
            }
            None => current = Some(rect),
        }
    }

    if let Some(line) = current {
        lines.push(line);
    }

    lines
}

/// [`merge_to_lines`], returned as quads ready for an annotation
pub fn merge_quads_to_lines(quads: &[Quad]) -> Vec<Quad> {
    merge_to_lines(quads).iter().map(Rect::to_quad).collect()
}
