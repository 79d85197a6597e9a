//! Read-only typed views over model output tensors.
//!
//! The inference engine owns the tensor buffers; this module only borrows
//! them. A [`TensorView`] exposes a bounds-checked `(channel, row, col)` view
//! over a flat buffer, and [`LayerResolver`] is the small capability the
//! caller supplies to look up an output layer by name.

use ndarray::{ArrayView2, ArrayView3, Axis};

/// Element type of a model output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Float32,
    Float16,
    Int32,
    Int8,
}

/// Dimensions of one output layer, channels first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerDims {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl LayerDims {
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Number of cells in one channel plane.
    pub const fn spatial(&self) -> usize {
        self.height * self.width
    }

    /// Total number of elements across all channels.
    pub const fn len(&self) -> usize {
        self.channels * self.spatial()
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Borrowed, read-only contents of an output layer.
#[derive(Debug, Clone, Copy)]
pub enum LayerBuffer<'a> {
    Float32(&'a [f32]),
    /// Raw IEEE 754 half-precision bits.
    Float16(&'a [u16]),
    Int32(&'a [i32]),
    Int8(&'a [i8]),
}

impl LayerBuffer<'_> {
    pub fn element(&self) -> ElementType {
        match self {
            LayerBuffer::Float32(_) => ElementType::Float32,
            LayerBuffer::Float16(_) => ElementType::Float16,
            LayerBuffer::Int32(_) => ElementType::Int32,
            LayerBuffer::Int8(_) => ElementType::Int8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LayerBuffer::Float32(data) => data.len(),
            LayerBuffer::Float16(data) => data.len(),
            LayerBuffer::Int32(data) => data.len(),
            LayerBuffer::Int8(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Descriptor for one model output layer: name, dims, and borrowed buffer.
///
/// The buffer stays owned by the caller and must outlive the parse call.
#[derive(Debug, Clone)]
pub struct OutputLayer<'a> {
    pub name: String,
    pub dims: LayerDims,
    pub buffer: LayerBuffer<'a>,
}

impl<'a> OutputLayer<'a> {
    /// Describe a float32 layer over a caller-owned slice.
    pub fn from_f32(name: impl Into<String>, dims: LayerDims, data: &'a [f32]) -> Self {
        Self {
            name: name.into(),
            dims,
            buffer: LayerBuffer::Float32(data),
        }
    }

    pub fn element(&self) -> ElementType {
        self.buffer.element()
    }
}

/// Read-only `(channel, row, col)` view over a float32 layer.
///
/// Construction checks that the buffer length matches the declared dims, so
/// indexing stays in bounds for coordinates derived from those dims.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    inner: ArrayView3<'a, f32>,
    dims: LayerDims,
}

impl<'a> TensorView<'a> {
    /// Build a view over `data` with the given dims, or `None` when the
    /// buffer length does not match.
    pub fn from_slice(data: &'a [f32], dims: LayerDims) -> Option<Self> {
        ArrayView3::from_shape((dims.channels, dims.height, dims.width), data)
            .ok()
            .map(|inner| Self { inner, dims })
    }

    pub fn dims(&self) -> LayerDims {
        self.dims
    }

    /// Value at `(channel, row, col)`. Panics on out-of-range coordinates.
    pub fn at(&self, channel: usize, row: usize, col: usize) -> f32 {
        self.inner[[channel, row, col]]
    }

    /// One channel plane as a 2-D view.
    pub fn channel(&self, channel: usize) -> ArrayView2<'a, f32> {
        self.inner.index_axis_move(Axis(0), channel)
    }
}

/// Capability to resolve an output layer by name, or report it absent.
///
/// Injected into the parser so it stays decoupled from any specific inference
/// engine's tensor registry.
pub trait LayerResolver<'a> {
    fn resolve(&self, name: &str) -> Option<&OutputLayer<'a>>;
}

impl<'a> LayerResolver<'a> for [OutputLayer<'a>] {
    fn resolve(&self, name: &str) -> Option<&OutputLayer<'a>> {
        self.iter().find(|layer| layer.name == name)
    }
}

impl<'a> LayerResolver<'a> for Vec<OutputLayer<'a>> {
    fn resolve(&self, name: &str) -> Option<&OutputLayer<'a>> {
        self.as_slice().resolve(name)
    }
}
