//! Capture session management.

use crossbeam_channel::Receiver;
use tracing::{debug, info, instrument, warn};

use crate::display::DisplayMetrics;
use crate::error::CaptureError;
use crate::frame::RawFrame;
use crate::projection::{CaptureGrant, VirtualDisplayRequest, VirtualSurface};
use crate::sink::PixelSink;
use crate::CaptureResult;

const SURFACE: &str = "virtual surface";
const SINK: &str = "pixel sink";
const GRANT: &str = "capture grant";

/// Outcome of a [`CaptureSession::cleanup`] pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Resources released during this pass, in release order.
    pub released: Vec<&'static str>,

    /// Resources that failed to release. They are dropped regardless.
    pub failures: Vec<CaptureError>,
}

impl CleanupReport {
    /// Returns true if nothing was held when cleanup ran.
    pub fn is_noop(&self) -> bool {
        self.released.is_empty() && self.failures.is_empty()
    }

    /// Returns true if every held resource released without error.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A bound capture: grant, pixel sink and virtual surface.
///
/// Obtained only through [`CaptureSession::start`], which either binds all
/// three or releases whatever it acquired. Dropping the session releases
/// anything still held.
pub struct CaptureSession {
    surface: Option<Box<dyn VirtualSurface>>,
    sink: Option<PixelSink>,
    grant: Option<Box<dyn CaptureGrant>>,
    metrics: DisplayMetrics,
}

impl CaptureSession {
    /// Bind `grant` to a new sink sized by `metrics`.
    ///
    /// Zeroed metrics are refused before any sink is allocated. On any
    /// failure the grant is stopped before the error is returned.
    #[instrument(
        name = "capture_session_start",
        skip(grant, metrics),
        fields(width = metrics.width_pixels, height = metrics.height_pixels)
    )]
    pub fn start(
        grant: Box<dyn CaptureGrant>,
        metrics: DisplayMetrics,
        display_name: &str,
    ) -> CaptureResult<Self> {
        let mut session = Self {
            surface: None,
            sink: None,
            grant: Some(grant),
            metrics,
        };

        if !metrics.is_valid() {
            session.cleanup();
            return Err(CaptureError::InvalidDimensions {
                width: metrics.width_pixels,
                height: metrics.height_pixels,
            });
        }

        if let Err(e) = session.bind(display_name) {
            warn!("Capture binding failed: {}", e);
            session.cleanup();
            return Err(e);
        }

        info!("Capture started");
        Ok(session)
    }

    fn bind(&mut self, display_name: &str) -> CaptureResult<()> {
        let (width, height) = self.metrics.dimensions();
        let mut sink = PixelSink::new(width, height)?;
        let producer = sink.producer()?;
        self.sink = Some(sink);

        let request = VirtualDisplayRequest {
            name: display_name.to_string(),
            metrics: self.metrics,
            auto_mirror: true,
        };

        let grant = self
            .grant
            .as_mut()
            .ok_or_else(|| CaptureError::BindingFailed("grant already released".into()))?;
        let surface = grant.create_virtual_display(&request, producer)?;
        self.surface = Some(surface);

        debug!(name = display_name, "Virtual display bound to sink");
        Ok(())
    }

    /// Receiver delivering the captured frame.
    pub fn frames(&self) -> Option<&Receiver<RawFrame>> {
        self.sink.as_ref().and_then(PixelSink::frames)
    }

    /// Metrics the session was bound with.
    pub fn metrics(&self) -> DisplayMetrics {
        self.metrics
    }

    /// Returns true if any resource is still held.
    pub fn holds_resources(&self) -> bool {
        self.surface.is_some() || self.sink.is_some() || self.grant.is_some()
    }

    /// Release the surface, the sink and the grant, in that order.
    ///
    /// Each release is attempted even if an earlier one failed, and each
    /// reference is dropped afterwards, so a second call is a no-op.
    #[instrument(name = "capture_session_cleanup", skip(self))]
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        if let Some(mut surface) = self.surface.take() {
            record(&mut report, SURFACE, surface.release());
        }

        if let Some(mut sink) = self.sink.take() {
            record(&mut report, SINK, sink.close());
        }

        if let Some(mut grant) = self.grant.take() {
            record(&mut report, GRANT, grant.stop());
        }

        if !report.is_noop() {
            info!(
                released = report.released.len(),
                failed = report.failures.len(),
                "Capture resources released"
            );
        }

        report
    }
}

fn record(report: &mut CleanupReport, resource: &'static str, result: CaptureResult<()>) {
    match result {
        Ok(()) => report.released.push(resource),
        Err(e) => {
            warn!("Failed to release {}: {}", resource, e);
            report.failures.push(e);
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.holds_resources() {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use parking_lot::Mutex;

    use super::*;
    use crate::sink::FrameProducer;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct FakeSurface {
        log: Log,
        fail: bool,
    }

    impl VirtualSurface for FakeSurface {
        fn release(&mut self) -> CaptureResult<()> {
            self.log.lock().push("surface");
            if self.fail {
                return Err(CaptureError::release(SURFACE, "compositor gone"));
            }
            Ok(())
        }
    }

    struct FakeGrant {
        log: Log,
        refuse_display: bool,
        fail_surface_release: bool,
        producer: Arc<Mutex<Option<FrameProducer>>>,
    }

    impl FakeGrant {
        fn new(log: &Log) -> Self {
            Self {
                log: Arc::clone(log),
                refuse_display: false,
                fail_surface_release: false,
                producer: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl CaptureGrant for FakeGrant {
        fn create_virtual_display(
            &mut self,
            request: &VirtualDisplayRequest,
            producer: FrameProducer,
        ) -> CaptureResult<Box<dyn VirtualSurface>> {
            if self.refuse_display {
                return Err(CaptureError::BindingFailed("out of surfaces".into()));
            }
            assert!(request.auto_mirror);
            *self.producer.lock() = Some(producer);
            Ok(Box::new(FakeSurface {
                log: Arc::clone(&self.log),
                fail: self.fail_surface_release,
            }))
        }

        fn stop(&mut self) -> CaptureResult<()> {
            self.log.lock().push("grant");
            Ok(())
        }
    }

    fn metrics() -> DisplayMetrics {
        DisplayMetrics::new(4, 2, 160)
    }

    #[test]
    fn test_start_binds_and_delivers_frame() {
        let log = Log::default();
        let grant = FakeGrant::new(&log);
        let producer = Arc::clone(&grant.producer);

        let session = CaptureSession::start(Box::new(grant), metrics(), "Screenshot").unwrap();
        assert!(session.holds_resources());

        let frame = RawFrame::new(Bytes::from(vec![7u8; 32]), 4, 16);
        assert!(producer.lock().as_ref().unwrap().try_submit(frame).unwrap());
        let received = session.frames().unwrap().try_recv().unwrap();
        assert_eq!(received.row_stride, 16);
    }

    #[test]
    fn test_cleanup_releases_in_order() {
        let log = Log::default();
        let mut session =
            CaptureSession::start(Box::new(FakeGrant::new(&log)), metrics(), "Screenshot").unwrap();

        let report = session.cleanup();
        assert_eq!(report.released, vec![SURFACE, SINK, GRANT]);
        assert!(report.is_clean());
        assert!(!session.holds_resources());
        assert!(session.frames().is_none());
        assert_eq!(*log.lock(), vec!["surface", "grant"]);
    }

    #[test]
    fn test_cleanup_twice_is_noop() {
        let log = Log::default();
        let mut session =
            CaptureSession::start(Box::new(FakeGrant::new(&log)), metrics(), "Screenshot").unwrap();

        session.cleanup();
        let second = session.cleanup();
        assert!(second.is_noop());
        assert_eq!(log.lock().len(), 2);

        drop(session);
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_release_failure_does_not_block_other_releases() {
        let log = Log::default();
        let mut grant = FakeGrant::new(&log);
        grant.fail_surface_release = true;
        let mut session = CaptureSession::start(Box::new(grant), metrics(), "Screenshot").unwrap();

        let report = session.cleanup();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.released, vec![SINK, GRANT]);
        assert!(!session.holds_resources());
        assert!(session.cleanup().is_noop());
    }

    #[test]
    fn test_zero_metrics_rejected_and_grant_stopped() {
        let log = Log::default();
        let result =
            CaptureSession::start(Box::new(FakeGrant::new(&log)), DisplayMetrics::zero(), "x");

        assert!(matches!(
            result,
            Err(CaptureError::InvalidDimensions { width: 0, height: 0 })
        ));
        assert_eq!(*log.lock(), vec!["grant"]);
    }

    #[test]
    fn test_binding_failure_leaves_nothing_held() {
        let log = Log::default();
        let mut grant = FakeGrant::new(&log);
        grant.refuse_display = true;

        let result = CaptureSession::start(Box::new(grant), metrics(), "Screenshot");
        assert!(matches!(result, Err(CaptureError::BindingFailed(_))));
        assert_eq!(*log.lock(), vec!["grant"]);
    }

    #[test]
    fn test_drop_releases_resources() {
        let log = Log::default();
        let session =
            CaptureSession::start(Box::new(FakeGrant::new(&log)), metrics(), "Screenshot").unwrap();
        drop(session);
        assert_eq!(*log.lock(), vec!["surface", "grant"]);
    }
}
