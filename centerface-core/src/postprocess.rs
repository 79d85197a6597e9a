//! Candidate extraction, geometric decoding, and non-maximum suppression.

use std::cmp::Ordering;

use centerface_utils::config::DetectionSettings;
use ndarray::ArrayView2;

use crate::tensor::TensorView;

/// Downsampling factor between the feature grid and the network input.
pub const FEATURE_STRIDE: f32 = 4.0;

/// Canonical CenterFace parsing configuration.
#[derive(Debug, Clone)]
pub struct PostprocessConfig {
    /// Minimum heatmap confidence for a grid cell to become a candidate.
    pub score_threshold: f32,
    /// IoU threshold for non-maximum suppression of overlapping boxes.
    pub nms_threshold: f32,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
        }
    }
}

impl From<DetectionSettings> for PostprocessConfig {
    fn from(settings: DetectionSettings) -> Self {
        PostprocessConfig {
            score_threshold: settings.score_threshold,
            nms_threshold: settings.nms_threshold,
        }
    }
}

impl From<&DetectionSettings> for PostprocessConfig {
    fn from(settings: &DetectionSettings) -> Self {
        settings.clone().into()
    }
}

/// Facial landmark coordinate (x, y) in network-input pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// A decoded face candidate in network-input pixel coordinates.
///
/// Corners are inclusive; extents use the `+1` pixel-inclusive convention.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Raw heatmap confidence of the originating grid cell.
    pub score: f32,
    /// Five facial landmarks decoded relative to the box's top-left corner.
    pub landmarks: [Landmark; 5],
}

impl FaceBox {
    /// Pixel-inclusive area of the box.
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1 + 1.0) * (self.y2 - self.y1 + 1.0)
    }

    /// Intersection over union with another box, pixel-inclusive.
    ///
    /// An empty intersection yields 0.
    pub fn iou(&self, other: &Self) -> f32 {
        let inner_x1 = self.x1.max(other.x1);
        let inner_y1 = self.y1.max(other.y1);
        let inner_x2 = self.x2.min(other.x2);
        let inner_y2 = self.y2.min(other.y2);

        let inner_w = inner_x2 - inner_x1 + 1.0;
        let inner_h = inner_y2 - inner_y1 + 1.0;
        if inner_w <= 0.0 || inner_h <= 0.0 {
            return 0.0;
        }

        let inner_area = inner_w * inner_h;
        inner_area / (self.area() + other.area() - inner_area)
    }
}

/// Grid cells whose confidence strictly exceeds `threshold`, in row-major
/// scan order.
pub fn extract_candidates(heatmap: &ArrayView2<'_, f32>, threshold: f32) -> Vec<(usize, usize)> {
    let mut candidates = Vec::new();
    for ((row, col), &score) in heatmap.indexed_iter() {
        if score > threshold {
            candidates.push((row, col));
        }
    }
    candidates
}

/// Decode one candidate grid cell into a face box with landmarks.
///
/// `d_w`/`d_h` are the stride-32 aligned working resolution the corner and
/// extents are clamped against.
pub(crate) fn decode_candidate(
    row: usize,
    col: usize,
    score: f32,
    scale: &TensorView<'_>,
    offset: &TensorView<'_>,
    landmarks: &TensorView<'_>,
    d_w: f32,
    d_h: f32,
) -> FaceBox {
    // The exponential maps the log-scale regression target back to pixels;
    // the stride maps grid cells back to input resolution.
    let s0 = scale.at(0, row, col).exp() * FEATURE_STRIDE;
    let s1 = scale.at(1, row, col).exp() * FEATURE_STRIDE;
    let o0 = offset.at(0, row, col);
    let o1 = offset.at(1, row, col);

    let x1 = ((col as f32 + o1 + 0.5) * FEATURE_STRIDE - s1 / 2.0)
        .max(0.0)
        .min(d_w);
    let y1 = ((row as f32 + o0 + 0.5) * FEATURE_STRIDE - s0 / 2.0)
        .max(0.0)
        .min(d_h);
    let x2 = (x1 + s1).min(d_w);
    let y2 = (y1 + s0).min(d_h);

    // Landmark channels interleave: odd = horizontal offset scaled by the
    // width extent, even = vertical offset scaled by the height extent.
    let mut points = [Landmark::default(); 5];
    for (j, point) in points.iter_mut().enumerate() {
        point.x = x1 + landmarks.at(2 * j + 1, row, col) * s1;
        point.y = y1 + landmarks.at(2 * j, row, col) * s0;
    }

    FaceBox {
        x1,
        y1,
        x2,
        y2,
        score,
        landmarks: points,
    }
}

/// Greedy non-maximum suppression over decoded boxes.
///
/// Boxes are stably sorted by score descending (equal scores keep their
/// pre-sort relative order); each kept box suppresses every later box whose
/// IoU with it strictly exceeds `threshold`. The result preserves
/// descending-score order.
pub fn non_max_suppression(mut boxes: Vec<FaceBox>, threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut merged = vec![false; boxes.len()];
    let mut kept = Vec::with_capacity(boxes.len());
    for i in 0..boxes.len() {
        if merged[i] {
            continue;
        }
        for j in (i + 1)..boxes.len() {
            if !merged[j] && boxes[i].iou(&boxes[j]) > threshold {
                merged[j] = true;
            }
        }
        kept.push(boxes[i].clone());
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::LayerDims;
    use ndarray::ArrayView2;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> FaceBox {
        FaceBox {
            x1,
            y1,
            x2,
            y2,
            score,
            landmarks: [Landmark::default(); 5],
        }
    }

    #[test]
    fn extraction_is_strict_and_row_major() {
        let grid = [
            0.0f32, 0.9, 0.5, 0.0, //
            0.0, 0.0, 0.0, 0.7, //
            0.6, 0.0, 0.0, 0.0,
        ];
        let view = ArrayView2::from_shape((3, 4), &grid[..]).unwrap();

        // 0.5 equals the threshold and must not qualify.
        let candidates = extract_candidates(&view, 0.5);
        assert_eq!(candidates, vec![(0, 1), (1, 3), (2, 0)]);
    }

    #[test]
    fn extraction_of_empty_grid_finds_nothing() {
        let grid = vec![0.0f32; 16];
        let view = ArrayView2::from_shape((4, 4), &grid[..]).unwrap();
        assert!(extract_candidates(&view, 0.5).is_empty());
    }

    #[test]
    fn iou_is_symmetric() {
        let a = face(0.0, 0.0, 9.0, 9.0, 0.9);
        let b = face(4.0, 4.0, 13.0, 13.0, 0.8);
        assert!((a.iou(&b) - b.iou(&a)).abs() < 1e-6);
        assert!(a.iou(&b) > 0.0);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = face(0.0, 0.0, 4.0, 4.0, 0.9);
        let b = face(100.0, 100.0, 104.0, 104.0, 0.8);
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(b.iou(&a), 0.0);
    }

    #[test]
    fn iou_uses_pixel_inclusive_areas() {
        // Identical single-pixel boxes: area is 1, not 0.
        let a = face(3.0, 3.0, 3.0, 3.0, 0.9);
        assert_eq!(a.area(), 1.0);
        assert_eq!(a.iou(&a.clone()), 1.0);
    }

    #[test]
    fn decode_recovers_centered_box() {
        let scale_data = vec![0.0f32; 2 * 16];
        let offset_data = vec![0.0f32; 2 * 16];
        let lm_data = vec![0.0f32; 10 * 16];
        let scale = TensorView::from_slice(&scale_data, LayerDims::new(2, 4, 4)).unwrap();
        let offset = TensorView::from_slice(&offset_data, LayerDims::new(2, 4, 4)).unwrap();
        let lm = TensorView::from_slice(&lm_data, LayerDims::new(10, 4, 4)).unwrap();

        // Zero log-scales decode to 4-pixel extents; cell (0,0) centers at (2,2).
        let face = decode_candidate(0, 0, 0.9, &scale, &offset, &lm, 32.0, 32.0);
        assert_eq!(face.x1, 0.0);
        assert_eq!(face.y1, 0.0);
        assert_eq!(face.x2, 4.0);
        assert_eq!(face.y2, 4.0);
        assert_eq!(face.score, 0.9);
        // Zero landmark offsets land on the top-left corner.
        for point in face.landmarks {
            assert_eq!(point.x, 0.0);
            assert_eq!(point.y, 0.0);
        }
    }

    #[test]
    fn decode_applies_landmark_channel_interleaving() {
        let scale_data = vec![0.0f32; 2 * 16];
        let offset_data = vec![0.0f32; 2 * 16];
        let mut lm_data = vec![0.0f32; 10 * 16];
        // Point 0 at cell (1,2): channel 1 is horizontal, channel 0 vertical.
        let (row, col) = (1, 2);
        let idx = row * 4 + col;
        lm_data[16 + idx] = 0.25; // channel 1
        lm_data[idx] = 0.5; // channel 0
        let scale = TensorView::from_slice(&scale_data, LayerDims::new(2, 4, 4)).unwrap();
        let offset = TensorView::from_slice(&offset_data, LayerDims::new(2, 4, 4)).unwrap();
        let lm = TensorView::from_slice(&lm_data, LayerDims::new(10, 4, 4)).unwrap();

        let face = decode_candidate(row, col, 0.8, &scale, &offset, &lm, 32.0, 32.0);
        assert!((face.landmarks[0].x - (face.x1 + 0.25 * 4.0)).abs() < 1e-6);
        assert!((face.landmarks[0].y - (face.y1 + 0.5 * 4.0)).abs() < 1e-6);
    }

    #[test]
    fn nms_suppresses_overlapping_lower_score() {
        let boxes = vec![
            face(1.0, 1.0, 11.0, 11.0, 0.7),
            face(0.0, 0.0, 10.0, 10.0, 0.95),
        ];
        let kept = non_max_suppression(boxes, 0.3);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].score, 0.95);
    }

    #[test]
    fn nms_keeps_disjoint_boxes_in_score_order() {
        let boxes = vec![
            face(0.0, 0.0, 4.0, 4.0, 0.6),
            face(100.0, 100.0, 104.0, 104.0, 0.9),
            face(200.0, 200.0, 204.0, 204.0, 0.7),
        ];
        let kept = non_max_suppression(boxes, 0.3);
        let scores: Vec<f32> = kept.iter().map(|b| b.score).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.6]);
    }

    #[test]
    fn nms_tie_break_is_stable() {
        let first = face(0.0, 0.0, 10.0, 10.0, 0.8);
        let second = face(50.0, 50.0, 60.0, 60.0, 0.8);
        let kept = non_max_suppression(vec![first.clone(), second.clone()], 0.3);
        assert_eq!(kept, vec![first, second]);
    }

    #[test]
    fn nms_checks_pairs_against_kept_boxes_only() {
        // b overlaps a (suppressed); c overlaps b but not a, so c survives.
        let a = face(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = face(4.0, 0.0, 14.0, 10.0, 0.8);
        let c = face(9.0, 0.0, 19.0, 10.0, 0.7);
        assert!(a.iou(&b) > 0.3);
        assert!(b.iou(&c) > 0.3);
        assert!(a.iou(&c) <= 0.3);

        let kept = non_max_suppression(vec![a, b, c], 0.3);
        let scores: Vec<f32> = kept.iter().map(|k| k.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }
}
