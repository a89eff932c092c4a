use crate::{
    buffers::FrameBuffers,
    device::{ColorFrame, MultiSourceReader, SampleFrame},
    error::FrameError,
    types::{AcquisitionStats, ColorImageFormat, FrameUpdate, Resolution},
};

/// Pulls the newest bundle from `reader` and refreshes whichever raw buffers
/// it carries a correctly sized frame for.
///
/// Never blocks. Missing or malformed sub-frames leave their buffer holding
/// the previous contents. All handles are dropped before this returns.
pub fn acquire_and_update(
    reader: &mut dyn MultiSourceReader,
    buffers: &mut FrameBuffers,
    stats: &mut AcquisitionStats,
) -> FrameUpdate {
    stats.polls += 1;

    let Some(bundle) = reader.acquire_latest_frame() else {
        log::trace!("no new multi-source frame");
        return FrameUpdate::default();
    };
    stats.bundles += 1;

    let mut update = FrameUpdate::default();

    match bundle.color_frame() {
        Ok(frame) => update.color = update_color(frame.as_ref(), buffers, stats),
        Err(err) => record_unavailable("color", &err, stats),
    }

    match bundle.depth_frame() {
        Ok(frame) => {
            let expected = buffers.geometry().depth;
            update.depth = copy_samples("depth", frame.as_ref(), expected, &mut buffers.depth, stats);
        }
        Err(err) => record_unavailable("depth", &err, stats),
    }

    match bundle.infrared_frame() {
        Ok(frame) => {
            let expected = buffers.geometry().infrared;
            update.infrared = copy_samples(
                "infrared",
                frame.as_ref(),
                expected,
                &mut buffers.infrared,
                stats,
            );
        }
        Err(err) => record_unavailable("infrared", &err, stats),
    }

    stats.record(update);
    update
}

fn record_unavailable(modality: &str, err: &FrameError, stats: &mut AcquisitionStats) {
    log::trace!("{modality} sub-frame skipped: {err}");
    stats.unavailable_sub_frames += 1;
}

fn update_color(
    frame: &dyn ColorFrame,
    buffers: &mut FrameBuffers,
    stats: &mut AcquisitionStats,
) -> bool {
    let expected_len = buffers.geometry().color_byte_len();
    let description = frame.description();

    let FrameBuffers {
        color,
        color_scratch,
        ..
    } = buffers;

    let source: &[u8] = if frame.raw_format() == ColorImageFormat::Bgra {
        frame.raw_buffer()
    } else {
        match frame.copy_converted_frame(color_scratch, ColorImageFormat::Bgra) {
            Ok(written) => &color_scratch[..written.min(color_scratch.len())],
            Err(err) => {
                log::warn!(
                    "failed to convert {:?} color frame ({}x{}): {err}",
                    frame.raw_format(),
                    description.width,
                    description.height
                );
                stats.conversion_failures += 1;
                return false;
            }
        }
    };

    if source.len() != expected_len {
        log::debug!(
            "discarding color frame: {} bytes ({}x{}), expected {expected_len}",
            source.len(),
            description.width,
            description.height
        );
        stats.size_mismatches += 1;
        return false;
    }

    color.copy_from_slice(source);
    true
}

fn copy_samples(
    modality: &str,
    frame: &dyn SampleFrame,
    expected: Resolution,
    dst: &mut [u16],
    stats: &mut AcquisitionStats,
) -> bool {
    let samples = frame.buffer();
    if samples.len() != expected.pixel_count() {
        let description = frame.description();
        log::debug!(
            "discarding {modality} frame: {} samples ({}x{}), expected {}",
            samples.len(),
            description.width,
            description.height,
            expected.pixel_count()
        );
        stats.size_mismatches += 1;
        return false;
    }

    dst.copy_from_slice(samples);
    true
}
