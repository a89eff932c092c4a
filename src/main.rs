use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use depth_align::{
    DepthAligner, SensorGeometry,
    device::SyntheticSensor,
    pipeline::{GeneratorConfig, start_frame_generator},
};

const DEFAULT_TICKS: u64 = 120;
const DEFAULT_TICK_MS: u64 = 33;
const REPORT_EVERY: u64 = 30;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let ticks = match args.next() {
        Some(arg) => arg
            .parse::<u64>()
            .with_context(|| format!("invalid tick count {arg:?}"))?,
        None => DEFAULT_TICKS,
    };
    let tick_interval = match args.next() {
        Some(arg) => Duration::from_millis(
            arg.parse::<u64>()
                .with_context(|| format!("invalid tick interval {arg:?}"))?,
        ),
        None => Duration::from_millis(DEFAULT_TICK_MS),
    };

    let geometry = SensorGeometry::default();
    let (sensor, frame_tx) = SyntheticSensor::new(geometry);
    let ledger = sensor.ledger();

    let mut aligner = DepthAligner::new(geometry);
    aligner
        .initialize_device(sensor)
        .context("failed to open depth sensor")?;

    let generator = start_frame_generator(
        GeneratorConfig {
            geometry,
            ..GeneratorConfig::default()
        },
        frame_tx,
    );

    let started = Instant::now();
    for tick in 1..=ticks {
        let tick_start = Instant::now();

        let update = aligner.acquire_and_update();
        if update.depth || update.color {
            aligner
                .compute_alignment()
                .context("failed to align color to depth")?;
        }

        if tick % REPORT_EVERY == 0 {
            let kept = aligner
                .aligned_view()
                .as_slice()
                .chunks_exact(4)
                .filter(|px| px[3] != 0)
                .count();
            let stats = aligner.stats();
            log::info!(
                "tick {tick}: {} bundles, {} empty polls, {:.1}% of color pixels grounded, {} live handles",
                stats.bundles,
                stats.empty_polls(),
                kept as f64 * 100.0 / geometry.color.pixel_count() as f64,
                ledger.live()
            );
        }

        if let Some(remaining) = tick_interval.checked_sub(tick_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    generator.stop();
    aligner.close_device();

    let stats = aligner.stats();
    println!(
        "{ticks} ticks in {:.2?}: color {} / depth {} / infrared {} updates, {} size mismatches, {} conversion failures",
        started.elapsed(),
        stats.color_updates,
        stats.depth_updates,
        stats.infrared_updates,
        stats.size_mismatches,
        stats.conversion_failures
    );

    Ok(())
}
