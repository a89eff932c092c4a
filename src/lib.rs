//! Synchronized color, depth and infrared acquisition from a depth sensor,
//! plus per-pixel alignment of the color image onto valid depth samples.
//!
//! ```no_run
//! use depth_align::{DepthAligner, SensorGeometry, device::SyntheticSensor};
//!
//! let (sensor, _frames) = SyntheticSensor::new(SensorGeometry::KINECT_V2);
//! let mut aligner = DepthAligner::default();
//! aligner.initialize_device(sensor)?;
//!
//! aligner.acquire_and_update();
//! aligner.compute_alignment()?;
//! let aligned = aligner.aligned_view();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod buffers;
pub mod device;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod sensor;
pub mod types;

pub use buffers::{FrameBuffers, FrameView};
pub use error::{AlignmentError, FrameError, MapperError, SensorError};
pub use mapper::AffineCoordinateMapper;
pub use sensor::DepthAligner;
pub use types::{
    AcquisitionStats, ColorImageFormat, DepthSpacePoint, FrameDescription, FrameUpdate,
    Resolution, SensorGeometry,
};
