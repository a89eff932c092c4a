//! Boundary to the depth sensor SDK.
//!
//! Every handle handed out here is an owned value whose `Drop` releases the
//! underlying SDK resource, so callers release on every exit path simply by
//! letting handles go out of scope.

pub mod synthetic;

use std::sync::Arc;

use crate::{
    error::{FrameError, MapperError, SensorError},
    types::{ColorImageFormat, DepthSpacePoint, FrameDescription},
};

pub use synthetic::{CapturedBundle, HandleLedger, SyntheticSensor};

/// Streams produced by a successful [`SensorDevice::open`].
pub struct DeviceStreams {
    pub reader: Box<dyn MultiSourceReader + Send>,
    /// `None` when the device has no factory calibration to offer.
    pub mapper: Option<Arc<dyn CoordinateMapper>>,
}

pub trait SensorDevice: Send {
    fn open(&mut self) -> Result<DeviceStreams, SensorError>;

    fn close(&mut self);
}

pub trait MultiSourceReader {
    /// Latest synchronized bundle, or `None` if nothing new arrived. Never
    /// blocks.
    fn acquire_latest_frame(&mut self) -> Option<Box<dyn MultiSourceFrame + '_>>;
}

pub trait MultiSourceFrame {
    fn color_frame(&self) -> Result<Box<dyn ColorFrame + '_>, FrameError>;

    fn depth_frame(&self) -> Result<Box<dyn SampleFrame + '_>, FrameError>;

    fn infrared_frame(&self) -> Result<Box<dyn SampleFrame + '_>, FrameError>;
}

pub trait ColorFrame {
    fn description(&self) -> FrameDescription;

    fn raw_format(&self) -> ColorImageFormat;

    fn raw_buffer(&self) -> &[u8];

    /// Converts the frame into `dst` and returns the number of bytes written.
    fn copy_converted_frame(
        &self,
        dst: &mut [u8],
        format: ColorImageFormat,
    ) -> Result<usize, FrameError>;
}

pub trait SampleFrame {
    fn description(&self) -> FrameDescription;

    fn buffer(&self) -> &[u16];
}

/// Factory calibration relating the color and depth cameras.
pub trait CoordinateMapper: Send + Sync {
    /// Writes one depth-space point per color pixel into `out`.
    ///
    /// Zero depth samples must not fail the call; the points they produce may
    /// fall outside the depth frame.
    fn map_color_frame_to_depth_space(
        &self,
        depth: &[u16],
        out: &mut [DepthSpacePoint],
    ) -> Result<(), MapperError>;
}
