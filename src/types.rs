pub const COLOR_BYTES_PER_PIXEL: usize = 4;

pub const KINECT_COLOR_WIDTH: u32 = 1920;
pub const KINECT_COLOR_HEIGHT: u32 = 1080;
pub const KINECT_DEPTH_WIDTH: u32 = 512;
pub const KINECT_DEPTH_HEIGHT: u32 = 424;
pub const KINECT_INFRARED_WIDTH: u32 = 512;
pub const KINECT_INFRARED_HEIGHT: u32 = 424;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Declared resolutions of the three sensor modalities.
///
/// Fixed for the lifetime of a [`crate::FrameBuffers`]; every incoming
/// sub-frame is validated against these numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorGeometry {
    pub color: Resolution,
    pub depth: Resolution,
    pub infrared: Resolution,
}

impl SensorGeometry {
    pub const KINECT_V2: SensorGeometry = SensorGeometry {
        color: Resolution::new(KINECT_COLOR_WIDTH, KINECT_COLOR_HEIGHT),
        depth: Resolution::new(KINECT_DEPTH_WIDTH, KINECT_DEPTH_HEIGHT),
        infrared: Resolution::new(KINECT_INFRARED_WIDTH, KINECT_INFRARED_HEIGHT),
    };

    pub const fn uniform(width: u32, height: u32) -> Self {
        let res = Resolution::new(width, height);
        Self {
            color: res,
            depth: res,
            infrared: res,
        }
    }

    pub const fn color_byte_len(&self) -> usize {
        self.color.pixel_count() * COLOR_BYTES_PER_PIXEL
    }
}

impl Default for SensorGeometry {
    fn default() -> Self {
        Self::KINECT_V2
    }
}

/// A location in the depth camera's pixel grid. Sub-pixel precision; may be
/// non-finite when the mapper could not place the point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DepthSpacePoint {
    pub x: f32,
    pub y: f32,
}

impl DepthSpacePoint {
    pub const INVALID: DepthSpacePoint = DepthSpacePoint {
        x: f32::NEG_INFINITY,
        y: f32::NEG_INFINITY,
    };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Nearest integer sample location inside `bounds`, if any.
    pub fn nearest_sample(&self, bounds: Resolution) -> Option<(usize, usize)> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return None;
        }

        let x = (self.x + 0.5).floor();
        let y = (self.y + 0.5).floor();
        if x < 0.0 || y < 0.0 || x >= bounds.width as f32 || y >= bounds.height as f32 {
            return None;
        }

        Some((x as usize, y as usize))
    }
}

/// Native layout of a color sub-frame as delivered by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorImageFormat {
    Rgba,
    Bgra,
    /// Packed 4:2:2, Y0 U Y1 V.
    Yuy2,
    /// Packed 4:2:2, U Y0 V Y1.
    Uyvy,
    Bayer,
}

impl ColorImageFormat {
    pub fn frame_len(&self, res: Resolution) -> usize {
        let pixels = res.pixel_count();
        match self {
            ColorImageFormat::Rgba | ColorImageFormat::Bgra => pixels * 4,
            ColorImageFormat::Yuy2 | ColorImageFormat::Uyvy => pixels * 2,
            ColorImageFormat::Bayer => pixels,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDescription {
    pub width: u32,
    pub height: u32,
}

impl FrameDescription {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameUpdate {
    pub color: bool,
    pub depth: bool,
    pub infrared: bool,
}

impl FrameUpdate {
    pub fn any(&self) -> bool {
        self.color || self.depth || self.infrared
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub polls: u64,
    pub bundles: u64,
    pub color_updates: u64,
    pub depth_updates: u64,
    pub infrared_updates: u64,
    pub unavailable_sub_frames: u64,
    pub size_mismatches: u64,
    pub conversion_failures: u64,
}

impl AcquisitionStats {
    pub fn empty_polls(&self) -> u64 {
        self.polls - self.bundles
    }

    pub(crate) fn record(&mut self, update: FrameUpdate) {
        self.color_updates += update.color as u64;
        self.depth_updates += update.depth as u64;
        self.infrared_updates += update.infrared as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_sample_rounds_half_up() {
        let bounds = Resolution::new(4, 4);
        assert_eq!(DepthSpacePoint::new(1.49, 2.5).nearest_sample(bounds), Some((1, 3)));
        assert_eq!(DepthSpacePoint::new(-0.5, 0.0).nearest_sample(bounds), Some((0, 0)));
        assert_eq!(DepthSpacePoint::new(-0.51, 0.0).nearest_sample(bounds), None);
    }

    #[test]
    fn nearest_sample_edges() {
        let bounds = Resolution::new(512, 424);
        assert_eq!(
            DepthSpacePoint::new(511.0, 423.0).nearest_sample(bounds),
            Some((511, 423))
        );
        assert_eq!(DepthSpacePoint::new(512.0, 0.0).nearest_sample(bounds), None);
        assert_eq!(DepthSpacePoint::new(0.0, 424.0).nearest_sample(bounds), None);
        assert_eq!(DepthSpacePoint::new(511.49, 0.0).nearest_sample(bounds), Some((511, 0)));
        assert_eq!(DepthSpacePoint::new(511.5, 0.0).nearest_sample(bounds), None);
        assert_eq!(DepthSpacePoint::new(-1.0, 5.0).nearest_sample(bounds), None);
    }

    #[test]
    fn non_finite_points_are_rejected() {
        let bounds = Resolution::new(8, 8);
        assert_eq!(DepthSpacePoint::INVALID.nearest_sample(bounds), None);
        assert_eq!(DepthSpacePoint::new(f32::NAN, 1.0).nearest_sample(bounds), None);
        assert_eq!(DepthSpacePoint::new(1.0, f32::INFINITY).nearest_sample(bounds), None);
    }

    #[test]
    fn kinect_geometry_is_default() {
        let geometry = SensorGeometry::default();
        assert_eq!(geometry.color_byte_len(), 1920 * 1080 * 4);
        assert_eq!(geometry.depth.pixel_count(), 512 * 424);
        assert_eq!(geometry.infrared.pixel_count(), 512 * 424);
    }

    #[test]
    fn packed_formats_use_two_bytes_per_pixel() {
        let res = Resolution::new(4, 2);
        assert_eq!(ColorImageFormat::Yuy2.frame_len(res), 16);
        assert_eq!(ColorImageFormat::Bgra.frame_len(res), 32);
        assert_eq!(ColorImageFormat::Bayer.frame_len(res), 8);
    }
}
