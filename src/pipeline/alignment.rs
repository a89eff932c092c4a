use rayon::prelude::*;

use crate::{
    buffers::FrameBuffers,
    device::CoordinateMapper,
    error::AlignmentError,
    types::{COLOR_BYTES_PER_PIXEL, DepthSpacePoint, Resolution},
};

const BLANK_PIXEL: [u8; COLOR_BYTES_PER_PIXEL] = [0, 0, 0, 0];

/// Projects every color pixel into depth space and rewrites the aligned
/// output: a pixel is kept only where it lands on a nonzero depth sample.
///
/// On error the aligned output still holds the last successful result.
pub fn compute_alignment(
    mapper: Option<&dyn CoordinateMapper>,
    buffers: &mut FrameBuffers,
) -> Result<(), AlignmentError> {
    let mapper = mapper.ok_or(AlignmentError::MappingUnavailable)?;
    let depth_res = buffers.geometry().depth;

    let FrameBuffers {
        color,
        depth,
        coordinates,
        aligned,
        ..
    } = buffers;

    mapper.map_color_frame_to_depth_space(depth, coordinates)?;
    composite(color, depth, depth_res, coordinates, aligned);

    Ok(())
}

/// Writes every pixel of `aligned`. Each output pixel depends only on its own
/// coordinate and the shared read-only inputs.
pub fn composite(
    color: &[u8],
    depth: &[u16],
    depth_res: Resolution,
    coordinates: &[DepthSpacePoint],
    aligned: &mut [u8],
) {
    aligned
        .par_chunks_exact_mut(COLOR_BYTES_PER_PIXEL)
        .zip(color.par_chunks_exact(COLOR_BYTES_PER_PIXEL))
        .zip(coordinates.par_iter())
        .for_each(|((out, src), point)| {
            let grounded = point
                .nearest_sample(depth_res)
                .is_some_and(|(x, y)| depth[y * depth_res.width as usize + x] != 0);

            if grounded {
                out.copy_from_slice(src);
            } else {
                out.copy_from_slice(&BLANK_PIXEL);
            }
        });
}
