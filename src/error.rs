use thiserror::Error;

use crate::types::ColorImageFormat;

/// Failures surfaced when opening the device.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("no depth sensor ready: {0}")]
    DeviceUnavailable(String),

    #[error("a device is already open on this aligner")]
    AlreadyOpen,
}

/// Failures of the alignment step. The aligned output is left untouched.
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("no coordinate mapper available")]
    MappingUnavailable,

    #[error("color to depth projection failed: {0}")]
    ProjectionFailed(#[from] MapperError),
}

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("depth buffer holds {got} samples, mapper expects {expected}")]
    DepthLength { got: usize, expected: usize },

    #[error("coordinate buffer holds {got} points, mapper expects {expected}")]
    CoordinateLength { got: usize, expected: usize },
}

/// Per sub-frame failures. Acquisition swallows these and leaves the
/// affected buffer unrefreshed.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("sub-frame not available in this bundle")]
    SubFrameUnavailable,

    #[error("no conversion from {0:?} to BGRA")]
    UnsupportedFormat(ColorImageFormat),

    #[error("{format:?} buffer too small: got {got}, expected {expected}")]
    BufferTooSmall {
        format: ColorImageFormat,
        got: usize,
        expected: usize,
    },

    #[error("destination holds {got} bytes, conversion needs {expected}")]
    DestinationTooSmall { got: usize, expected: usize },

    #[error("color conversion failed: {0}")]
    Conversion(String),
}
