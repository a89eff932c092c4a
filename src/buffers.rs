use image::{ImageBuffer, Luma, RgbaImage};
use rayon::prelude::*;

use crate::types::{COLOR_BYTES_PER_PIXEL, DepthSpacePoint, Resolution, SensorGeometry};

/// Borrowed, read-only view over one of the store's buffers.
///
/// `stride` is counted in elements of `T`, so a BGRA color row is
/// `width * 4` bytes and a depth row is `width` samples.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a, T> {
    data: &'a [T],
    width: u32,
    height: u32,
    channels: usize,
}

impl<'a, T> FrameView<'a, T> {
    fn new(data: &'a [T], res: Resolution, channels: usize) -> Self {
        debug_assert_eq!(data.len(), res.pixel_count() * channels);
        Self {
            data,
            width: res.width,
            height: res.height,
            channels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.channels
    }

    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    pub fn row(&self, y: u32) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride();
        self.data.get(start..start + self.stride())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&'a [T]> {
        if x >= self.width {
            return None;
        }
        let offset = x as usize * self.channels;
        self.row(y)?.get(offset..offset + self.channels)
    }
}

impl<'a> FrameView<'a, u16> {
    /// Zero-copy `image` view over a single channel 16-bit frame.
    pub fn as_luma_image(&self) -> Option<ImageBuffer<Luma<u16>, &'a [u16]>> {
        ImageBuffer::from_raw(self.width, self.height, self.data)
    }
}

impl FrameView<'_, u8> {
    /// Swizzles the BGRA bytes into an owned RGBA image.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let mut rgba = vec![0u8; self.data.len()];
        rgba.par_chunks_mut(COLOR_BYTES_PER_PIXEL)
            .zip(self.data.par_chunks_exact(COLOR_BYTES_PER_PIXEL))
            .for_each(|(dst, src)| {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
                dst[3] = src[3];
            });
        RgbaImage::from_raw(self.width, self.height, rgba)
    }
}

/// Fixed-size storage for one sensor session.
///
/// Every buffer is allocated and zeroed once in [`FrameBuffers::new`]; later
/// ticks only overwrite contents, never reallocate.
#[derive(Debug)]
pub struct FrameBuffers {
    geometry: SensorGeometry,
    pub(crate) color: Vec<u8>,
    pub(crate) depth: Vec<u16>,
    pub(crate) infrared: Vec<u16>,
    pub(crate) coordinates: Vec<DepthSpacePoint>,
    pub(crate) aligned: Vec<u8>,
    pub(crate) color_scratch: Vec<u8>,
}

impl FrameBuffers {
    pub fn new(geometry: SensorGeometry) -> Self {
        let color_len = geometry.color_byte_len();
        Self {
            geometry,
            color: vec![0u8; color_len],
            depth: vec![0u16; geometry.depth.pixel_count()],
            infrared: vec![0u16; geometry.infrared.pixel_count()],
            coordinates: vec![DepthSpacePoint::default(); geometry.color.pixel_count()],
            aligned: vec![0u8; color_len],
            color_scratch: vec![0u8; color_len],
        }
    }

    pub fn geometry(&self) -> SensorGeometry {
        self.geometry
    }

    pub fn color_view(&self) -> FrameView<'_, u8> {
        FrameView::new(&self.color, self.geometry.color, COLOR_BYTES_PER_PIXEL)
    }

    pub fn depth_view(&self) -> FrameView<'_, u16> {
        FrameView::new(&self.depth, self.geometry.depth, 1)
    }

    pub fn infrared_view(&self) -> FrameView<'_, u16> {
        FrameView::new(&self.infrared, self.geometry.infrared, 1)
    }

    pub fn aligned_view(&self) -> FrameView<'_, u8> {
        FrameView::new(&self.aligned, self.geometry.color, COLOR_BYTES_PER_PIXEL)
    }

    pub fn coordinates(&self) -> &[DepthSpacePoint] {
        &self.coordinates
    }

    /// Overwrites the raw color buffer. Returns `false` and leaves the buffer
    /// untouched unless `bgra` is exactly one color frame long.
    pub fn write_color(&mut self, bgra: &[u8]) -> bool {
        copy_exact(&mut self.color, bgra)
    }

    pub fn write_depth(&mut self, samples: &[u16]) -> bool {
        copy_exact(&mut self.depth, samples)
    }

    pub fn write_infrared(&mut self, samples: &[u16]) -> bool {
        copy_exact(&mut self.infrared, samples)
    }
}

fn copy_exact<T: Copy>(dst: &mut [T], src: &[T]) -> bool {
    if dst.len() != src.len() {
        return false;
    }
    dst.copy_from_slice(src);
    true
}
