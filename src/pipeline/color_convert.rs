use rayon::prelude::*;
use yuv::{
    YuvPackedImage, YuvRange, YuvStandardMatrix, uyvy422_to_bgra, uyvy422_to_rgba,
    yuyv422_to_bgra, yuyv422_to_rgba,
};

use crate::{
    error::FrameError,
    types::{ColorImageFormat, Resolution},
};

/// Converts one color frame from `src_format` into `dst_format`, writing the
/// result to the front of `dst`. Returns the number of bytes written.
///
/// Only the 4-channel layouts (RGBA and BGRA) are valid targets.
pub fn convert_frame(
    src: &[u8],
    src_format: ColorImageFormat,
    res: Resolution,
    dst: &mut [u8],
    dst_format: ColorImageFormat,
) -> Result<usize, FrameError> {
    if !matches!(dst_format, ColorImageFormat::Bgra | ColorImageFormat::Rgba) {
        return Err(FrameError::UnsupportedFormat(dst_format));
    }

    let src_len = src_format.frame_len(res);
    if src.len() < src_len {
        return Err(FrameError::BufferTooSmall {
            format: src_format,
            got: src.len(),
            expected: src_len,
        });
    }

    let dst_len = dst_format.frame_len(res);
    if dst.len() < dst_len {
        return Err(FrameError::DestinationTooSmall {
            got: dst.len(),
            expected: dst_len,
        });
    }

    let src = &src[..src_len];
    let dst = &mut dst[..dst_len];
    let to_bgra = dst_format == ColorImageFormat::Bgra;

    match src_format {
        ColorImageFormat::Bgra | ColorImageFormat::Rgba if src_format == dst_format => {
            dst.copy_from_slice(src);
        }
        ColorImageFormat::Bgra | ColorImageFormat::Rgba => swap_red_blue(src, dst),
        ColorImageFormat::Yuy2 => yuyv_to_four_channel(src, res, dst, to_bgra)?,
        ColorImageFormat::Uyvy => uyvy_to_four_channel(src, res, dst, to_bgra)?,
        ColorImageFormat::Bayer => return Err(FrameError::UnsupportedFormat(src_format)),
    }

    Ok(dst_len)
}

fn swap_red_blue(src: &[u8], dst: &mut [u8]) {
    dst.par_chunks_mut(4)
        .zip(src.par_chunks_exact(4))
        .for_each(|(dst, src)| {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        });
}

fn yuyv_to_four_channel(
    src: &[u8],
    res: Resolution,
    dst: &mut [u8],
    to_bgra: bool,
) -> Result<(), FrameError> {
    let packed = YuvPackedImage {
        yuy: src,
        yuy_stride: res.width * 2,
        width: res.width,
        height: res.height,
    };

    let result = if to_bgra {
        yuyv422_to_bgra(
            &packed,
            dst,
            res.width * 4,
            YuvRange::Limited,
            YuvStandardMatrix::Bt601,
        )
    } else {
        yuyv422_to_rgba(
            &packed,
            dst,
            res.width * 4,
            YuvRange::Limited,
            YuvStandardMatrix::Bt601,
        )
    };

    result.map_err(|err| FrameError::Conversion(format!("YUY2 conversion failed: {err:?}")))
}

fn uyvy_to_four_channel(
    src: &[u8],
    res: Resolution,
    dst: &mut [u8],
    to_bgra: bool,
) -> Result<(), FrameError> {
    let packed = YuvPackedImage {
        yuy: src,
        yuy_stride: res.width * 2,
        width: res.width,
        height: res.height,
    };

    let result = if to_bgra {
        uyvy422_to_bgra(
            &packed,
            dst,
            res.width * 4,
            YuvRange::Limited,
            YuvStandardMatrix::Bt601,
        )
    } else {
        uyvy422_to_rgba(
            &packed,
            dst,
            res.width * 4,
            YuvRange::Limited,
            YuvStandardMatrix::Bt601,
        )
    };

    result.map_err(|err| FrameError::Conversion(format!("UYVY conversion failed: {err:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_source_is_swizzled_to_bgra() {
        let res = Resolution::new(2, 1);
        let src = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut dst = [0u8; 8];

        let written =
            convert_frame(&src, ColorImageFormat::Rgba, res, &mut dst, ColorImageFormat::Bgra)
                .expect("rgba converts");

        assert_eq!(written, 8);
        assert_eq!(dst, [3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn bgra_to_bgra_is_a_copy() {
        let res = Resolution::new(1, 1);
        let mut dst = [0u8; 4];
        convert_frame(
            &[9, 8, 7, 6],
            ColorImageFormat::Bgra,
            res,
            &mut dst,
            ColorImageFormat::Bgra,
        )
        .expect("copy");
        assert_eq!(dst, [9, 8, 7, 6]);
    }

    #[test]
    fn yuy2_gray_converts_to_opaque_gray() {
        let res = Resolution::new(4, 2);
        // Mid-gray luma with neutral chroma.
        let src: Vec<u8> = [128u8, 128, 128, 128].repeat(4);
        let mut dst = vec![0u8; 32];

        let written =
            convert_frame(&src, ColorImageFormat::Yuy2, res, &mut dst, ColorImageFormat::Bgra)
                .expect("yuy2 converts");

        assert_eq!(written, 32);
        for px in dst.chunks_exact(4) {
            assert_eq!(px[3], 255);
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert!(px[0] > 100 && px[0] < 160, "unexpected gray level {}", px[0]);
        }
    }

    #[test]
    fn uyvy_gray_converts_to_opaque_gray() {
        let res = Resolution::new(4, 2);
        let src: Vec<u8> = [128u8, 128, 128, 128].repeat(4);
        let mut dst = vec![0u8; 32];

        let written =
            convert_frame(&src, ColorImageFormat::Uyvy, res, &mut dst, ColorImageFormat::Bgra)
                .expect("uyvy converts");

        assert_eq!(written, 32);
        for px in dst.chunks_exact(4) {
            assert_eq!(px[3], 255);
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert!(px[0] > 100 && px[0] < 160, "unexpected gray level {}", px[0]);
        }
    }

    #[test]
    fn rgba_target_orders_red_first() {
        let res = Resolution::new(4, 2);
        // Strong red chroma, weak blue chroma.
        let yuy2: Vec<u8> = [128u8, 90, 128, 200].repeat(4);
        let uyvy: Vec<u8> = [90u8, 128, 200, 128].repeat(4);

        for (src, format) in [(&yuy2, ColorImageFormat::Yuy2), (&uyvy, ColorImageFormat::Uyvy)] {
            let mut rgba = vec![0u8; 32];
            let mut bgra = vec![0u8; 32];
            convert_frame(src, format, res, &mut rgba, ColorImageFormat::Rgba).expect("to rgba");
            convert_frame(src, format, res, &mut bgra, ColorImageFormat::Bgra).expect("to bgra");

            for (rgba, bgra) in rgba.chunks_exact(4).zip(bgra.chunks_exact(4)) {
                assert!(rgba[0] > rgba[2], "{format:?}: red {} blue {}", rgba[0], rgba[2]);
                assert_eq!(rgba[3], 255);
                assert_eq!(rgba, [bgra[2], bgra[1], bgra[0], bgra[3]]);
            }
        }
    }

    #[test]
    fn short_source_is_rejected() {
        let res = Resolution::new(4, 2);
        let mut dst = vec![0u8; 32];
        let err = convert_frame(
            &[0u8; 15],
            ColorImageFormat::Yuy2,
            res,
            &mut dst,
            ColorImageFormat::Bgra,
        )
        .expect_err("too small");
        assert!(matches!(
            err,
            FrameError::BufferTooSmall {
                got: 15,
                expected: 16,
                ..
            }
        ));
        assert!(dst.iter().all(|&b| b == 0));
    }

    #[test]
    fn bayer_and_packed_targets_are_unsupported() {
        let res = Resolution::new(2, 2);
        let mut dst = vec![0u8; 16];
        let bayer = convert_frame(
            &[0u8; 4],
            ColorImageFormat::Bayer,
            res,
            &mut dst,
            ColorImageFormat::Bgra,
        );
        assert!(matches!(
            bayer,
            Err(FrameError::UnsupportedFormat(ColorImageFormat::Bayer))
        ));

        let packed_target = convert_frame(
            &[0u8; 16],
            ColorImageFormat::Bgra,
            res,
            &mut dst,
            ColorImageFormat::Yuy2,
        );
        assert!(matches!(
            packed_target,
            Err(FrameError::UnsupportedFormat(ColorImageFormat::Yuy2))
        ));
    }
}
