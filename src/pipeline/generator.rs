use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Sender, TrySendError};

use crate::{
    device::CapturedBundle,
    types::{ColorImageFormat, Resolution, SensorGeometry},
};

// Depth values produced by the generator, in millimetres.
const NEAR_PLANE_MM: u16 = 500;
const FAR_PLANE_MM: u16 = 4500;

#[derive(Clone, Copy, Debug)]
pub struct GeneratorConfig {
    pub geometry: SensorGeometry,
    pub target_fps: u32,
    pub color_format: ColorImageFormat,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            geometry: SensorGeometry::default(),
            target_fps: 30,
            color_format: ColorImageFormat::Yuy2,
        }
    }
}

impl GeneratorConfig {
    fn frame_interval(&self) -> Duration {
        Duration::from_millis(1_000 / u64::from(self.target_fps.max(1)))
    }
}

/// Background thread producing synthetic bundles. Stops and joins on drop.
#[derive(Debug)]
pub struct FrameGenerator {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FrameGenerator {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FrameGenerator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn start_frame_generator(
    config: GeneratorConfig,
    frame_tx: Sender<CapturedBundle>,
) -> FrameGenerator {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let interval = config.frame_interval();
        let mut tick = 0u32;

        log::info!(
            "synthetic frame generator running at {} fps ({:?} color)",
            config.target_fps,
            config.color_format
        );

        while !stop_flag.load(Ordering::Relaxed) {
            let started = Instant::now();
            let bundle = synthetic_bundle(config.geometry, config.color_format, tick);

            // A full queue drops this bundle and keeps the older queued ones.
            match frame_tx.try_send(bundle) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    log::debug!("frame consumer disconnected, stopping generator");
                    break;
                }
            }

            tick = tick.wrapping_add(1);
            if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }
    });

    FrameGenerator {
        stop,
        handle: Some(handle),
    }
}

/// One bundle of moving test patterns: a color gradient, a depth ramp with a
/// circular hole of zero samples, and an infrared ramp.
pub fn synthetic_bundle(
    geometry: SensorGeometry,
    color_format: ColorImageFormat,
    tick: u32,
) -> CapturedBundle {
    CapturedBundle::default()
        .with_color(
            geometry.color,
            color_format,
            color_pattern(geometry.color, color_format, tick),
        )
        .with_depth(geometry.depth, depth_pattern(geometry.depth, tick))
        .with_infrared(geometry.infrared, infrared_pattern(geometry.infrared, tick))
}

fn color_pattern(res: Resolution, format: ColorImageFormat, tick: u32) -> Vec<u8> {
    let width = res.width as usize;
    let mut data = vec![0u8; format.frame_len(res)];
    let shade = |x: usize, y: usize| -> (u8, u8, u8) {
        let r = ((x + tick as usize) % width.max(1) * 255 / width.max(1)) as u8;
        let g = (y * 255 / (res.height as usize).max(1)) as u8;
        (r, g, 128)
    };

    match format {
        ColorImageFormat::Bgra | ColorImageFormat::Rgba => {
            for (index, px) in data.chunks_exact_mut(4).enumerate() {
                let (r, g, b) = shade(index % width, index / width);
                let [c0, c2] = if format == ColorImageFormat::Bgra { [b, r] } else { [r, b] };
                px.copy_from_slice(&[c0, g, c2, 255]);
            }
        }
        ColorImageFormat::Yuy2 | ColorImageFormat::Uyvy => {
            for (pair, chunk) in data.chunks_exact_mut(4).enumerate() {
                let index = pair * 2;
                let (r, g, _) = shade(index % width, index / width);
                let luma = 16 + (u16::from(r) * 219 / 255) as u8;
                let cb = 128u8.wrapping_add(g / 4);
                let cr = 128u8.wrapping_sub(g / 4);
                let bytes = if format == ColorImageFormat::Yuy2 {
                    [luma, cb, luma, cr]
                } else {
                    [cb, luma, cr, luma]
                };
                chunk.copy_from_slice(&bytes);
            }
        }
        ColorImageFormat::Bayer => {
            for (index, px) in data.iter_mut().enumerate() {
                *px = shade(index % width, index / width).0;
            }
        }
    }

    data
}

fn depth_pattern(res: Resolution, tick: u32) -> Vec<u16> {
    let width = res.width as usize;
    let height = res.height as usize;
    let span = u32::from(FAR_PLANE_MM - NEAR_PLANE_MM);
    let hole_radius = (width.min(height) / 6).max(1);
    let hole_x = (tick as usize * 4) % width.max(1);
    let hole_y = height / 2;

    (0..res.pixel_count())
        .map(|index| {
            let (x, y) = (index % width, index / width);
            let dx = x.abs_diff(hole_x);
            let dy = y.abs_diff(hole_y);
            if dx * dx + dy * dy < hole_radius * hole_radius {
                0
            } else {
                NEAR_PLANE_MM + (x as u32 * span / width.max(1) as u32) as u16
            }
        })
        .collect()
}

fn infrared_pattern(res: Resolution, tick: u32) -> Vec<u16> {
    let width = res.width as u32;
    (0..res.pixel_count())
        .map(|index| {
            let x = index as u32 % width.max(1);
            (x.wrapping_add(tick) % width.max(1) * u32::from(u16::MAX) / width.max(1)) as u16
        })
        .collect()
}
