use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::CaptureError;

use super::{Frame, FrameSource};

/// Capture-thread side of a [`QueueFrameSource`]
pub struct FrameProducer {
    producer: Producer<Frame>,
}

impl FrameProducer {
    /// Push a frame; when the ring is full the frame is handed back
    pub fn push(&mut self, frame: Frame) -> Result<(), Frame> {
        self.producer.push(frame).map_err(|err| match err {
            rtrb::PushError::Full(frame) => frame,
        })
    }
}

/// Frame source fed by a lock-free SPSC ring from another thread
///
/// Each read drains the ring and keeps the newest frame, like a camera that
/// always shows the latest image. With nothing new pushed, the previous frame
/// is returned again.
pub struct QueueFrameSource {
    consumer: Consumer<Frame>,
    latest: Option<Frame>,
    open: bool,
}

impl QueueFrameSource {
    pub fn new(capacity: usize) -> (FrameProducer, Self) {
        let (producer, consumer) = RingBuffer::new(capacity.max(1));
        (
            FrameProducer { producer },
            Self {
                consumer,
                latest: None,
                open: false,
            },
        )
    }
}

impl FrameSource for QueueFrameSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.consumer.is_abandoned() && self.consumer.is_empty() && self.latest.is_none() {
            return Err(CaptureError::DeviceUnavailable {
                reason: "capture thread is gone".to_string(),
            });
        }
        self.open = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.open {
            return Err(CaptureError::NotOpen);
        }
        while let Ok(frame) = self.consumer.pop() {
            self.latest = Some(frame);
        }
        self.latest.clone().ok_or(CaptureError::FrameUnavailable)
    }

    fn close(&mut self) {
        self.open = false;
        self.latest = None;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: f32) -> Frame {
        Frame::uniform(2, 2, 1, value)
    }

    #[test]
    fn test_latest_frame_wins() {
        let (mut producer, mut source) = QueueFrameSource::new(4);
        source.open().unwrap();
        assert_eq!(
            source.next_frame().unwrap_err(),
            CaptureError::FrameUnavailable
        );

        producer.push(frame(0.1)).unwrap();
        producer.push(frame(0.2)).unwrap();
        producer.push(frame(0.3)).unwrap();
        assert_eq!(source.next_frame().unwrap(), frame(0.3));

        // Nothing new: the last frame repeats
        assert_eq!(source.next_frame().unwrap(), frame(0.3));
    }

    #[test]
    fn test_full_ring_returns_frame() {
        let (mut producer, _source) = QueueFrameSource::new(1);
        producer.push(frame(0.1)).unwrap();
        let rejected = producer.push(frame(0.2)).unwrap_err();
        assert_eq!(rejected, frame(0.2));
    }

    #[test]
    fn test_cross_thread_delivery() {
        let (mut producer, mut source) = QueueFrameSource::new(8);
        source.open().unwrap();

        let handle = std::thread::spawn(move || {
            for i in 0..4 {
                producer.push(frame(i as f32 / 10.0)).unwrap();
            }
        });
        handle.join().unwrap();

        assert_eq!(source.next_frame().unwrap(), frame(0.3));
    }

    #[test]
    fn test_open_fails_when_producer_dropped_without_frames() {
        let (producer, mut source) = QueueFrameSource::new(2);
        drop(producer);
        assert!(matches!(
            source.open(),
            Err(CaptureError::DeviceUnavailable { .. })
        ));
    }

    #[test]
    fn test_read_requires_open() {
        let (_producer, mut source) = QueueFrameSource::new(2);
        assert_eq!(source.next_frame().unwrap_err(), CaptureError::NotOpen);
    }
}
