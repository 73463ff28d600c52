//! Coordinate transformation from PDF space to a rendered page viewport

use serde::{Deserialize, Serialize};

/// US Letter, used when a page has no MediaBox anywhere up its tree.
pub const LETTER_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Rectangle on a page rendered at some scale (top-left origin, pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Convert a PDF rectangle `[x1, y1, x2, y2]` (bottom-left origin, points) to
/// viewport pixels. `media_box` is `[x, y, width, height]`.
pub fn pdf_rect_to_viewport(rect: [f64; 4], media_box: [f64; 4], scale: f64) -> ViewportRect {
    let [mb_x, mb_y, _mb_width, mb_height] = media_box;
    let [x1, y1, x2, y2] = rect;

    // Flip Y axis against the top edge of the page box
    let page_top = mb_y + mb_height;

    ViewportRect {
        left: (x1 - mb_x) * scale,
        top: (page_top - y2) * scale,
        width: (x2 - x1) * scale,
        height: (y2 - y1) * scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_is_measured_from_page_top() {
        let rect = [100.0, 700.0, 200.0, 720.0];
        let view = pdf_rect_to_viewport(rect, LETTER_MEDIA_BOX, 1.0);
        assert!((view.top - 72.0).abs() < 1e-9);
        assert!((view.left - 100.0).abs() < 1e-9);
        assert!((view.width - 100.0).abs() < 1e-9);
        assert!((view.height - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_applies_to_every_component() {
        let rect = [50.0, 100.0, 150.0, 130.0];
        let view = pdf_rect_to_viewport(rect, LETTER_MEDIA_BOX, 1.5);
        assert!((view.top - (792.0 * 1.5 - 130.0 * 1.5)).abs() < 1e-9);
        assert!((view.left - 75.0).abs() < 1e-9);
        assert!((view.width - 150.0).abs() < 1e-9);
        assert!((view.height - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_offset_media_box() {
        let media_box = [10.0, 20.0, 600.0, 800.0];
        let view = pdf_rect_to_viewport([10.0, 800.0, 20.0, 820.0], media_box, 1.0);
        assert!(view.top.abs() < 1e-9);
        assert!(view.left.abs() < 1e-9);
    }
}
