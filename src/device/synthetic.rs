//! In-process sensor fed through a channel.
//!
//! Bundles pushed into the sender returned by [`SyntheticSensor::new`] are
//! served to the acquisition engine exactly like SDK frames. Every handle the
//! reader hands out is counted in a [`HandleLedger`], which lets callers check
//! that nothing outlives the tick that acquired it.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

use super::{
    ColorFrame, CoordinateMapper, DeviceStreams, MultiSourceFrame, MultiSourceReader, SampleFrame,
    SensorDevice,
};
use crate::{
    error::{FrameError, SensorError},
    mapper::AffineCoordinateMapper,
    pipeline::color_convert,
    types::{ColorImageFormat, FrameDescription, Resolution, SensorGeometry},
};

// Producers drop new bundles while this many are queued, so the newest bundle
// a reader drains to can lag the producer by up to this many frames.
const BUNDLE_QUEUE_DEPTH: usize = 2;

#[derive(Clone, Debug)]
pub struct CapturedColor {
    pub width: u32,
    pub height: u32,
    pub format: ColorImageFormat,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct CapturedSamples {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct CapturedBundle {
    pub color: Option<CapturedColor>,
    pub depth: Option<CapturedSamples>,
    pub infrared: Option<CapturedSamples>,
}

impl CapturedBundle {
    pub fn with_color(mut self, res: Resolution, format: ColorImageFormat, data: Vec<u8>) -> Self {
        self.color = Some(CapturedColor {
            width: res.width,
            height: res.height,
            format,
            data,
        });
        self
    }

    pub fn with_depth(mut self, res: Resolution, samples: Vec<u16>) -> Self {
        self.depth = Some(CapturedSamples {
            width: res.width,
            height: res.height,
            samples,
        });
        self
    }

    pub fn with_infrared(mut self, res: Resolution, samples: Vec<u16>) -> Self {
        self.infrared = Some(CapturedSamples {
            width: res.width,
            height: res.height,
            samples,
        });
        self
    }
}

/// Counts handles handed out by a synthetic reader.
#[derive(Clone, Debug, Default)]
pub struct HandleLedger {
    inner: Arc<LedgerCounts>,
}

#[derive(Debug, Default)]
struct LedgerCounts {
    live: AtomicU64,
    acquired: AtomicU64,
}

impl HandleLedger {
    pub fn live(&self) -> u64 {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> u64 {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    fn guard(&self) -> HandleGuard {
        self.inner.live.fetch_add(1, Ordering::SeqCst);
        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        HandleGuard {
            ledger: self.clone(),
        }
    }
}

#[derive(Debug)]
struct HandleGuard {
    ledger: HandleLedger,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.ledger.inner.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SyntheticSensor {
    geometry: SensorGeometry,
    frame_rx: Receiver<CapturedBundle>,
    mapper: Option<Arc<dyn CoordinateMapper>>,
    available: bool,
    is_open: Arc<AtomicBool>,
    ledger: HandleLedger,
}

impl SyntheticSensor {
    /// A sensor with the given geometry and a stretch mapper between its
    /// color and depth grids. Push bundles into the returned sender.
    pub fn new(geometry: SensorGeometry) -> (Self, Sender<CapturedBundle>) {
        let (frame_tx, frame_rx) = bounded(BUNDLE_QUEUE_DEPTH);
        let sensor = Self {
            geometry,
            frame_rx,
            mapper: Some(Arc::new(AffineCoordinateMapper::for_geometry(geometry))),
            available: true,
            is_open: Arc::new(AtomicBool::new(false)),
            ledger: HandleLedger::default(),
        };
        (sensor, frame_tx)
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn CoordinateMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn without_calibration(mut self) -> Self {
        self.mapper = None;
        self
    }

    /// Every `open` call fails as if no sensor were attached.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn geometry(&self) -> SensorGeometry {
        self.geometry
    }

    pub fn ledger(&self) -> HandleLedger {
        self.ledger.clone()
    }

    pub fn open_flag(&self) -> Arc<AtomicBool> {
        self.is_open.clone()
    }
}

impl SensorDevice for SyntheticSensor {
    fn open(&mut self) -> Result<DeviceStreams, SensorError> {
        if !self.available {
            return Err(SensorError::DeviceUnavailable(
                "synthetic sensor configured as absent".to_string(),
            ));
        }

        self.is_open.store(true, Ordering::SeqCst);
        Ok(DeviceStreams {
            reader: Box::new(SyntheticReader {
                frame_rx: self.frame_rx.clone(),
                ledger: self.ledger.clone(),
            }),
            mapper: self.mapper.clone(),
        })
    }

    fn close(&mut self) {
        self.is_open.store(false, Ordering::SeqCst);
    }
}

struct SyntheticReader {
    frame_rx: Receiver<CapturedBundle>,
    ledger: HandleLedger,
}

impl MultiSourceReader for SyntheticReader {
    fn acquire_latest_frame(&mut self) -> Option<Box<dyn MultiSourceFrame + '_>> {
        let mut bundle = match self.frame_rx.try_recv() {
            Ok(bundle) => bundle,
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
        };
        // Skip stale bundles so the consumer always sees the newest capture.
        while let Ok(newer) = self.frame_rx.try_recv() {
            bundle = newer;
        }

        Some(Box::new(BundleHandle {
            bundle,
            ledger: self.ledger.clone(),
            _guard: self.ledger.guard(),
        }))
    }
}

struct BundleHandle {
    bundle: CapturedBundle,
    ledger: HandleLedger,
    _guard: HandleGuard,
}

impl MultiSourceFrame for BundleHandle {
    fn color_frame(&self) -> Result<Box<dyn ColorFrame + '_>, FrameError> {
        let frame = self
            .bundle
            .color
            .as_ref()
            .ok_or(FrameError::SubFrameUnavailable)?;
        Ok(Box::new(ColorHandle {
            frame,
            _guard: self.ledger.guard(),
        }))
    }

    fn depth_frame(&self) -> Result<Box<dyn SampleFrame + '_>, FrameError> {
        let frame = self
            .bundle
            .depth
            .as_ref()
            .ok_or(FrameError::SubFrameUnavailable)?;
        Ok(Box::new(SampleHandle {
            frame,
            _guard: self.ledger.guard(),
        }))
    }

    fn infrared_frame(&self) -> Result<Box<dyn SampleFrame + '_>, FrameError> {
        let frame = self
            .bundle
            .infrared
            .as_ref()
            .ok_or(FrameError::SubFrameUnavailable)?;
        Ok(Box::new(SampleHandle {
            frame,
            _guard: self.ledger.guard(),
        }))
    }
}

struct ColorHandle<'a> {
    frame: &'a CapturedColor,
    _guard: HandleGuard,
}

impl ColorFrame for ColorHandle<'_> {
    fn description(&self) -> FrameDescription {
        FrameDescription {
            width: self.frame.width,
            height: self.frame.height,
        }
    }

    fn raw_format(&self) -> ColorImageFormat {
        self.frame.format
    }

    fn raw_buffer(&self) -> &[u8] {
        &self.frame.data
    }

    fn copy_converted_frame(
        &self,
        dst: &mut [u8],
        format: ColorImageFormat,
    ) -> Result<usize, FrameError> {
        color_convert::convert_frame(
            &self.frame.data,
            self.frame.format,
            self.description().resolution(),
            dst,
            format,
        )
    }
}

struct SampleHandle<'a> {
    frame: &'a CapturedSamples,
    _guard: HandleGuard,
}

impl SampleFrame for SampleHandle<'_> {
    fn description(&self) -> FrameDescription {
        FrameDescription {
            width: self.frame.width,
            height: self.frame.height,
        }
    }

    fn buffer(&self) -> &[u16] {
        &self.frame.samples
    }
}
