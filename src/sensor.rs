use std::sync::Arc;

use crate::{
    buffers::{FrameBuffers, FrameView},
    device::{CoordinateMapper, MultiSourceReader, SensorDevice},
    error::{AlignmentError, SensorError},
    pipeline::{acquisition, alignment},
    types::{AcquisitionStats, FrameUpdate, SensorGeometry},
};

/// Owns one sensor session: the device, its frame reader and calibration,
/// and the buffers every tick writes into.
///
/// Drive it from a single loop: [`DepthAligner::acquire_and_update`] then
/// [`DepthAligner::compute_alignment`], once per tick.
pub struct DepthAligner {
    buffers: FrameBuffers,
    device: Option<Box<dyn SensorDevice>>,
    reader: Option<Box<dyn MultiSourceReader + Send>>,
    mapper: Option<Arc<dyn CoordinateMapper>>,
    stats: AcquisitionStats,
}

impl DepthAligner {
    pub fn new(geometry: SensorGeometry) -> Self {
        log::info!(
            "allocating frame buffers: color {}x{}, depth {}x{}, infrared {}x{}",
            geometry.color.width,
            geometry.color.height,
            geometry.depth.width,
            geometry.depth.height,
            geometry.infrared.width,
            geometry.infrared.height
        );

        Self {
            buffers: FrameBuffers::new(geometry),
            device: None,
            reader: None,
            mapper: None,
            stats: AcquisitionStats::default(),
        }
    }

    /// Opens `device` and keeps its stream reader and calibration.
    pub fn initialize_device<D>(&mut self, device: D) -> Result<(), SensorError>
    where
        D: SensorDevice + 'static,
    {
        if self.device.is_some() {
            return Err(SensorError::AlreadyOpen);
        }

        let mut device: Box<dyn SensorDevice> = Box::new(device);
        let streams = match device.open() {
            Ok(streams) => streams,
            Err(err) => {
                log::error!("sensor initialization failed: {err}");
                return Err(err);
            }
        };

        if streams.mapper.is_none() {
            log::warn!("sensor opened without a coordinate mapper; alignment will fail");
        }
        log::info!("sensor opened");

        self.reader = Some(streams.reader);
        self.mapper = streams.mapper;
        self.device = Some(device);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Closes the device if one is open. Safe to call any number of times.
    pub fn close_device(&mut self) {
        self.reader = None;
        self.mapper = None;
        if let Some(mut device) = self.device.take() {
            device.close();
            log::info!("sensor closed");
        }
    }

    /// Polls for the newest bundle and refreshes the raw buffers it carries.
    /// A no-op when no device is open or nothing new arrived.
    pub fn acquire_and_update(&mut self) -> FrameUpdate {
        let Some(reader) = self.reader.as_mut() else {
            return FrameUpdate::default();
        };
        acquisition::acquire_and_update(reader.as_mut(), &mut self.buffers, &mut self.stats)
    }

    /// Recomputes the aligned color image from the current buffers.
    pub fn compute_alignment(&mut self) -> Result<(), AlignmentError> {
        alignment::compute_alignment(self.mapper.as_deref(), &mut self.buffers)
    }

    pub fn geometry(&self) -> SensorGeometry {
        self.buffers.geometry()
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    pub fn buffers(&self) -> &FrameBuffers {
        &self.buffers
    }

    pub fn color_view(&self) -> FrameView<'_, u8> {
        self.buffers.color_view()
    }

    pub fn depth_view(&self) -> FrameView<'_, u16> {
        self.buffers.depth_view()
    }

    pub fn infrared_view(&self) -> FrameView<'_, u16> {
        self.buffers.infrared_view()
    }

    pub fn aligned_view(&self) -> FrameView<'_, u8> {
        self.buffers.aligned_view()
    }
}

impl Default for DepthAligner {
    fn default() -> Self {
        Self::new(SensorGeometry::default())
    }
}

impl Drop for DepthAligner {
    fn drop(&mut self) {
        self.close_device();
        log::debug!("releasing frame buffers");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{
        device::{CapturedBundle, SyntheticSensor},
        mapper::AffineCoordinateMapper,
        types::{ColorImageFormat, DepthSpacePoint, Resolution},
    };

    const GEOMETRY: SensorGeometry = SensorGeometry::uniform(6, 4);

    #[test]
    fn alignment_without_device_reports_missing_mapper() {
        let mut aligner = DepthAligner::new(GEOMETRY);

        assert!(matches!(
            aligner.compute_alignment(),
            Err(AlignmentError::MappingUnavailable)
        ));
        assert!(aligner.aligned_view().as_slice().iter().all(|&b| b == 0));
        assert_eq!(aligner.acquire_and_update(), FrameUpdate::default());
    }

    #[test]
    fn unavailable_device_is_reported_at_open() {
        let (sensor, _tx) = SyntheticSensor::new(GEOMETRY);
        let mut aligner = DepthAligner::new(GEOMETRY);

        let err = aligner
            .initialize_device(sensor.unavailable())
            .expect_err("absent sensor");

        assert!(matches!(err, SensorError::DeviceUnavailable(_)));
        assert!(!aligner.is_open());
    }

    #[test]
    fn second_device_is_rejected() {
        let (first, _tx1) = SyntheticSensor::new(GEOMETRY);
        let (second, _tx2) = SyntheticSensor::new(GEOMETRY);
        let mut aligner = DepthAligner::new(GEOMETRY);

        aligner.initialize_device(first).expect("first opens");
        assert!(matches!(
            aligner.initialize_device(second),
            Err(SensorError::AlreadyOpen)
        ));
    }

    #[test]
    fn close_is_idempotent_and_runs_on_drop() {
        let (sensor, _tx) = SyntheticSensor::new(GEOMETRY);
        let open = sensor.open_flag();
        let mut aligner = DepthAligner::new(GEOMETRY);
        aligner.initialize_device(sensor).expect("opens");
        assert!(open.load(Ordering::SeqCst));

        aligner.close_device();
        aligner.close_device();
        assert!(!open.load(Ordering::SeqCst));
        assert!(!aligner.is_open());

        let (sensor, _tx) = SyntheticSensor::new(GEOMETRY);
        let open = sensor.open_flag();
        let mut aligner = DepthAligner::new(GEOMETRY);
        aligner.initialize_device(sensor).expect("opens");
        drop(aligner);
        assert!(!open.load(Ordering::SeqCst));
    }

    #[test]
    fn uncalibrated_device_still_acquires() {
        let (sensor, tx) = SyntheticSensor::new(GEOMETRY);
        let mut aligner = DepthAligner::new(GEOMETRY);
        aligner
            .initialize_device(sensor.without_calibration())
            .expect("opens");

        tx.send(CapturedBundle::default().with_depth(GEOMETRY.depth, vec![9; 24]))
            .unwrap();

        assert!(aligner.acquire_and_update().depth);
        assert!(matches!(
            aligner.compute_alignment(),
            Err(AlignmentError::MappingUnavailable)
        ));
        assert_eq!(aligner.stats().depth_updates, 1);
    }

    #[test]
    fn tick_with_identity_mapping_passes_color_through() {
        let (sensor, tx) = SyntheticSensor::new(GEOMETRY);
        let ledger = sensor.ledger();
        let mut aligner = DepthAligner::new(GEOMETRY);
        aligner
            .initialize_device(
                sensor.with_mapper(Arc::new(AffineCoordinateMapper::identity(GEOMETRY))),
            )
            .expect("opens");

        let color: Vec<u8> = (1..=GEOMETRY.color_byte_len() as u8).collect();
        tx.send(
            CapturedBundle::default()
                .with_color(GEOMETRY.color, ColorImageFormat::Bgra, color.clone())
                .with_depth(GEOMETRY.depth, vec![500; 24])
                .with_infrared(Resolution::new(6, 4), vec![1; 24]),
        )
        .unwrap();

        let update = aligner.acquire_and_update();
        aligner.compute_alignment().expect("aligned");

        assert!(update.any());
        assert_eq!(aligner.aligned_view().as_slice(), color.as_slice());
        assert_eq!(ledger.live(), 0);

        let coordinates = aligner.buffers().coordinates();
        assert_eq!(coordinates.len(), GEOMETRY.color.pixel_count());
        assert_eq!(coordinates[7], DepthSpacePoint::new(1.0, 1.0));
    }
}
