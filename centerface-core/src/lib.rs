//! Core CenterFace output-tensor parsing primitives.
//!
//! This crate decodes the heatmap/scale/offset/landmark tensors produced by a
//! CenterFace-style keypoint detector into a clean list of face detections:
//! candidate extraction, geometric box/landmark decoding, greedy non-maximum
//! suppression, and final clipping to the network resolution. Running the
//! model and owning the tensor buffers are the caller's concern.

/// Layer resolution, validation, and final detection assembly.
pub mod parser;
/// Candidate extraction, geometric decoding, and non-maximum suppression.
pub mod postprocess;
/// Read-only typed views over caller-owned output tensor buffers.
pub mod tensor;

pub use parser::{
    DetectedObject, DetectionParams, HEATMAP_LAYER, LANDMARK_LAYER, NetworkInfo, OFFSET_LAYER,
    ParseError, SCALE_LAYER, parse_objects,
};
pub use postprocess::{
    FaceBox, Landmark, PostprocessConfig, extract_candidates, non_max_suppression,
};
pub use tensor::{ElementType, LayerBuffer, LayerDims, LayerResolver, OutputLayer, TensorView};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
