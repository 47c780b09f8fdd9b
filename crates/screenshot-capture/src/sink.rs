//! Pixel sink receiving frames from a virtual capture surface.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, trace};

use crate::error::CaptureError;
use crate::frame::{RawFrame, BYTES_PER_PIXEL};
use crate::CaptureResult;

/// Number of frames a sink can hold before new ones are dropped.
pub const SINK_BUFFER_DEPTH: usize = 1;

/// Pixel layout delivered into a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bits per channel, R G B A byte order.
    Rgba8888,
}

impl PixelFormat {
    /// Bytes of colour data per pixel.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8888 => BYTES_PER_PIXEL,
        }
    }
}

/// Frame receptor sized to the captured display.
///
/// Holds at most [`SINK_BUFFER_DEPTH`] pending frame. The producer is handed
/// to the virtual surface; the session reads from [`PixelSink::frames`].
/// The sink keeps no sending end of its own, so the receiver disconnects
/// once every producer is dropped.
pub struct PixelSink {
    width: u32,
    height: u32,
    format: PixelFormat,
    sender: Option<Sender<RawFrame>>,
    receiver: Option<Receiver<RawFrame>>,
}

impl PixelSink {
    /// Allocate a sink for `width × height` RGBA frames.
    pub fn new(width: u32, height: u32) -> CaptureResult<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidDimensions { width, height });
        }

        let (sender, receiver) = crossbeam_channel::bounded(SINK_BUFFER_DEPTH);
        debug!(width, height, "Pixel sink allocated");

        Ok(Self {
            width,
            height,
            format: PixelFormat::Rgba8888,
            sender: Some(sender),
            receiver: Some(receiver),
        })
    }

    /// Take the producer that feeds this sink. Only one can be taken.
    pub fn producer(&mut self) -> CaptureResult<FrameProducer> {
        if self.is_closed() {
            return Err(CaptureError::SinkClosed);
        }
        let sender = self.sender.take().ok_or(CaptureError::ProducerTaken)?;
        Ok(FrameProducer {
            sender,
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }

    /// Receiver for delivered frames, or `None` once closed.
    pub fn frames(&self) -> Option<&Receiver<RawFrame>> {
        self.receiver.as_ref()
    }

    /// Sink dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Configured pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Check if the sink has been closed.
    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }

    /// Close the sink, discarding any pending frame.
    ///
    /// Producers observe [`CaptureError::SinkClosed`] afterwards.
    pub fn close(&mut self) -> CaptureResult<()> {
        let receiver = self.receiver.take().ok_or(CaptureError::SinkClosed)?;
        self.sender = None;

        let discarded = receiver.try_iter().count();
        if discarded > 0 {
            debug!(discarded, "Discarded pending frames on close");
        }

        Ok(())
    }
}

/// Producing end of a [`PixelSink`].
#[derive(Clone)]
pub struct FrameProducer {
    sender: Sender<RawFrame>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl FrameProducer {
    /// Dimensions the sink expects.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel format the sink expects.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Offer a frame to the sink.
    ///
    /// Returns `Ok(false)` if a frame is already pending and this one was
    /// dropped.
    pub fn try_submit(&self, frame: RawFrame) -> CaptureResult<bool> {
        match self.sender.try_send(frame) {
            Ok(()) => {
                trace!("Frame queued in sink");
                Ok(true)
            }
            Err(TrySendError::Full(_)) => {
                debug!("Sink full, dropping frame");
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(CaptureError::SinkClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame() -> RawFrame {
        RawFrame::new(Bytes::from_static(&[0; 16]), 4, 8)
    }

    #[test]
    fn test_sink_holds_one_frame() {
        let mut sink = PixelSink::new(2, 2).unwrap();
        let producer = sink.producer().unwrap();

        assert!(producer.try_submit(frame()).unwrap());
        assert!(!producer.try_submit(frame()).unwrap());

        let frames = sink.frames().unwrap();
        assert!(frames.try_recv().is_ok());
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn test_zero_sized_sink_is_rejected() {
        assert!(matches!(
            PixelSink::new(0, 10),
            Err(CaptureError::InvalidDimensions { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_closed_sink_rejects_producers() {
        let mut sink = PixelSink::new(2, 2).unwrap();
        let producer = sink.producer().unwrap();
        sink.close().unwrap();

        assert!(sink.is_closed());
        assert!(sink.frames().is_none());
        assert!(matches!(sink.producer(), Err(CaptureError::SinkClosed)));
        assert!(matches!(
            producer.try_submit(frame()),
            Err(CaptureError::SinkClosed)
        ));
        assert!(matches!(sink.close(), Err(CaptureError::SinkClosed)));
    }

    #[test]
    fn test_dropped_producers_disconnect_frames() {
        let mut sink = PixelSink::new(2, 2).unwrap();
        let producer = sink.producer().unwrap();
        let clone = producer.clone();
        assert!(matches!(sink.producer(), Err(CaptureError::ProducerTaken)));

        drop(producer);
        assert!(matches!(
            sink.frames().unwrap().try_recv(),
            Err(crossbeam_channel::TryRecvError::Empty)
        ));

        drop(clone);
        assert!(matches!(
            sink.frames().unwrap().try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_sink_reports_configuration() {
        let mut sink = PixelSink::new(1080, 2340).unwrap();
        assert_eq!(sink.dimensions(), (1080, 2340));
        assert_eq!(sink.format().bytes_per_pixel(), 4);
        assert_eq!(sink.producer().unwrap().dimensions(), (1080, 2340));
    }
}
