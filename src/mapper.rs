use rayon::prelude::*;

use crate::{
    device::CoordinateMapper,
    error::MapperError,
    types::{DepthSpacePoint, Resolution, SensorGeometry},
};

/// Color to depth mapping built from a per-axis scale and offset, with an
/// optional horizontal parallax term for the baseline between the cameras.
///
/// A color pixel (`cx`, `cy`) first lands at
/// `(cx * scale_x + offset_x, cy * scale_y + offset_y)` in depth space. When
/// `parallax` is nonzero and the depth sample nearest that point is valid,
/// the point is shifted left by `parallax / depth_mm` pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct AffineCoordinateMapper {
    color: Resolution,
    depth: Resolution,
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub parallax: f32,
}

impl AffineCoordinateMapper {
    pub fn identity(geometry: SensorGeometry) -> Self {
        Self {
            color: geometry.color,
            depth: geometry.depth,
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            parallax: 0.0,
        }
    }

    /// Stretches the color grid over the depth grid, matching pixel centers.
    pub fn for_geometry(geometry: SensorGeometry) -> Self {
        let scale_x = geometry.depth.width as f32 / geometry.color.width as f32;
        let scale_y = geometry.depth.height as f32 / geometry.color.height as f32;
        Self {
            color: geometry.color,
            depth: geometry.depth,
            scale_x,
            scale_y,
            offset_x: 0.5 * scale_x - 0.5,
            offset_y: 0.5 * scale_y - 0.5,
            parallax: 0.0,
        }
    }

    pub fn with_parallax(mut self, parallax: f32) -> Self {
        self.parallax = parallax;
        self
    }

    fn project(&self, index: usize, depth: &[u16]) -> DepthSpacePoint {
        let width = self.color.width as usize;
        let cx = (index % width) as f32;
        let cy = (index / width) as f32;
        let point = DepthSpacePoint::new(
            cx * self.scale_x + self.offset_x,
            cy * self.scale_y + self.offset_y,
        );

        if self.parallax == 0.0 {
            return point;
        }

        let Some((dx, dy)) = point.nearest_sample(self.depth) else {
            return point;
        };
        match depth[dy * self.depth.width as usize + dx] {
            0 => point,
            d => DepthSpacePoint::new(point.x - self.parallax / d as f32, point.y),
        }
    }
}

impl CoordinateMapper for AffineCoordinateMapper {
    fn map_color_frame_to_depth_space(
        &self,
        depth: &[u16],
        out: &mut [DepthSpacePoint],
    ) -> Result<(), MapperError> {
        if depth.len() != self.depth.pixel_count() {
            return Err(MapperError::DepthLength {
                got: depth.len(),
                expected: self.depth.pixel_count(),
            });
        }
        if out.len() != self.color.pixel_count() {
            return Err(MapperError::CoordinateLength {
                got: out.len(),
                expected: self.color.pixel_count(),
            });
        }

        out.par_iter_mut()
            .enumerate()
            .for_each(|(index, point)| *point = self.project(index, depth));

        Ok(())
    }
}
