//! Layer resolution, validation, and final detection assembly.
//!
//! The entry point is [`parse_objects`]: resolve the four named CenterFace
//! output layers, decode candidates, suppress overlaps, and clip survivors to
//! the network resolution.

use centerface_utils::timing_guard;
use log::{Level, debug};
use thiserror::Error;

use crate::postprocess::{
    FaceBox, PostprocessConfig, decode_candidate, extract_candidates, non_max_suppression,
};
use crate::tensor::{ElementType, LayerBuffer, LayerDims, LayerResolver, TensorView};

/// Heatmap layer, shape `[1, H, W]`.
pub const HEATMAP_LAYER: &str = "537";
/// Scale layer, shape `[2, H, W]`.
pub const SCALE_LAYER: &str = "538";
/// Offset layer, shape `[2, H, W]`.
pub const OFFSET_LAYER: &str = "539";
/// Landmark layer, shape `[10, H, W]` (5 point pairs).
pub const LANDMARK_LAYER: &str = "540";

/// Every surviving detection is reported with this fixed confidence.
const OUTPUT_CONFIDENCE: f32 = 0.99;
/// The model detects a single class.
const FACE_CLASS_ID: u32 = 0;

/// Network input resolution the output tensors were produced at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub width: u32,
    pub height: u32,
}

impl NetworkInfo {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Stride-32 aligned working resolution the decoder clamps against.
    fn aligned(&self) -> (f32, f32) {
        (
            (self.width.div_ceil(32) * 32) as f32,
            (self.height.div_ceil(32) * 32) as f32,
        )
    }
}

/// Per-class detection parameters supplied by the calling pipeline.
///
/// Accepted for interface compatibility; the CenterFace decode path does not
/// consult these fields.
#[derive(Debug, Clone)]
pub struct DetectionParams {
    pub num_classes: usize,
    pub per_class_threshold: Vec<f32>,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            num_classes: 1,
            per_class_threshold: vec![0.5],
        }
    }
}

/// Final detection emitted to the caller, in network-input pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedObject {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub class_id: u32,
}

/// Structural failures: the model outputs do not match the expected contract.
///
/// These are non-retryable and signal a misconfigured pipeline upstream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("required output layer '{0}' is missing")]
    MissingLayer(&'static str),
    #[error("output layer '{name}' has element type {element:?}; expected Float32")]
    UnsupportedElement {
        name: &'static str,
        element: ElementType,
    },
    #[error("output layer '{name}' holds {actual} values but its dims require {expected}")]
    BufferMismatch {
        name: &'static str,
        actual: usize,
        expected: usize,
    },
    #[error("output layer '{name}' has dims {found:?}; expected {expected:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: LayerDims,
        found: LayerDims,
    },
}

/// Parse one frame's CenterFace output tensors into face detections.
///
/// `objects` is cleared on entry and repopulated on success, in
/// descending-score order. On error it is left empty; no partial results are
/// emitted. A frame with no candidates above the score threshold succeeds
/// with an empty result.
pub fn parse_objects<'a>(
    layers: &impl LayerResolver<'a>,
    network: NetworkInfo,
    _params: &DetectionParams,
    config: &PostprocessConfig,
    objects: &mut Vec<DetectedObject>,
) -> Result<(), ParseError> {
    objects.clear();
    let _guard = timing_guard("centerface_core::parse_objects", Level::Debug);

    let heatmap = float_view(layers, HEATMAP_LAYER)?;
    let scale = float_view(layers, SCALE_LAYER)?;
    let offset = float_view(layers, OFFSET_LAYER)?;
    let landmarks = float_view(layers, LANDMARK_LAYER)?;

    let grid = heatmap.dims();
    expect_shape(HEATMAP_LAYER, &heatmap, 1, grid)?;
    expect_shape(SCALE_LAYER, &scale, 2, grid)?;
    expect_shape(OFFSET_LAYER, &offset, 2, grid)?;
    expect_shape(LANDMARK_LAYER, &landmarks, 10, grid)?;

    let confidence = heatmap.channel(0);
    let candidates = {
        let _guard = timing_guard("centerface_core::extract_candidates", Level::Trace);
        extract_candidates(&confidence, config.score_threshold)
    };
    debug!(
        "{} candidate(s) above {:.2} on a {}x{} grid",
        candidates.len(),
        config.score_threshold,
        grid.height,
        grid.width
    );

    let (d_w, d_h) = network.aligned();
    let mut faces: Vec<FaceBox> = Vec::with_capacity(candidates.len());
    {
        let _guard = timing_guard("centerface_core::decode_candidates", Level::Trace);
        for (row, col) in candidates {
            let score = confidence[[row, col]];
            faces.push(decode_candidate(
                row, col, score, &scale, &offset, &landmarks, d_w, d_h,
            ));
        }
    }

    let kept = {
        let _guard = timing_guard("centerface_core::non_max_suppression", Level::Trace);
        non_max_suppression(faces, config.nms_threshold)
    };

    let max_x = network.width.saturating_sub(1) as f32;
    let max_y = network.height.saturating_sub(1) as f32;
    for face in kept {
        let left = clip(face.x1, 0.0, max_x);
        let top = clip(face.y1, 0.0, max_y);
        let width = clip(face.x2 - face.x1, 0.0, max_x);
        let height = clip(face.y2 - face.y1, 0.0, max_y);
        if width == 0.0 || height == 0.0 {
            continue;
        }
        objects.push(DetectedObject {
            left,
            top,
            width,
            height,
            confidence: OUTPUT_CONFIDENCE,
            class_id: FACE_CLASS_ID,
        });
    }
    debug!("{} detection(s) after suppression and clipping", objects.len());

    Ok(())
}

/// Resolve a required layer and view it as float32 with validated dims.
fn float_view<'a>(
    layers: &impl LayerResolver<'a>,
    name: &'static str,
) -> Result<TensorView<'a>, ParseError> {
    let layer = layers
        .resolve(name)
        .ok_or(ParseError::MissingLayer(name))?;
    match layer.buffer {
        LayerBuffer::Float32(data) => TensorView::from_slice(data, layer.dims).ok_or(
            ParseError::BufferMismatch {
                name,
                actual: data.len(),
                expected: layer.dims.len(),
            },
        ),
        other => Err(ParseError::UnsupportedElement {
            name,
            element: other.element(),
        }),
    }
}

fn expect_shape(
    name: &'static str,
    view: &TensorView<'_>,
    channels: usize,
    grid: LayerDims,
) -> Result<(), ParseError> {
    let found = view.dims();
    let expected = LayerDims::new(channels, grid.height, grid.width);
    if found != expected {
        return Err(ParseError::ShapeMismatch {
            name,
            expected,
            found,
        });
    }
    Ok(())
}

fn clip(value: f32, lo: f32, hi: f32) -> f32 {
    value.min(hi).max(lo)
}
