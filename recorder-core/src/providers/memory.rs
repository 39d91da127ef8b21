use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioFormat, CaptureDevice, DEFAULT_DEVICE_ID};
use crate::models::error::CaptureError;
use crate::session::frame_sink::FrameSink;
use crate::traits::capture_backend::{CaptureBackend, CaptureStream, DeviceCatalog};

const DEVICE_NAME: &str = "Memory Input";

struct Shared {
    channels: u16,
    sink: Mutex<Option<FrameSink>>,
    generation: AtomicU64,
    started: AtomicBool,
    fail_start: AtomicBool,
}

/// Host-fed capture backend with a single synthetic input device.
///
/// Audio pushed through a [`MemoryFeeder`] reaches the engine exactly as if a
/// device callback had delivered it, but only while the stream is started.
/// Useful for tests and for running the pipeline over decoded files.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(2)
    }
}

impl MemoryBackend {
    /// A backend whose device reports `channels` input channels.
    pub fn new(channels: u16) -> Self {
        Self {
            shared: Arc::new(Shared {
                channels,
                sink: Mutex::new(None),
                generation: AtomicU64::new(0),
                started: AtomicBool::new(false),
                fail_start: AtomicBool::new(false),
            }),
        }
    }

    pub fn feeder(&self) -> MemoryFeeder {
        MemoryFeeder {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Make subsequent `start` calls fail as if the hardware refused.
    pub fn set_fail_start(&self, fail: bool) {
        self.shared.fail_start.store(fail, Ordering::Relaxed);
    }
}

impl DeviceCatalog for MemoryBackend {
    type Handle = ();

    fn list_devices(&self) -> Result<Vec<CaptureDevice>, CaptureError> {
        Ok(vec![CaptureDevice {
            id: 0,
            name: DEVICE_NAME.to_string(),
            is_default: true,
            channels: self.shared.channels,
        }])
    }

    fn resolve(&self, device_id: i32) -> Result<(), CaptureError> {
        match device_id {
            DEFAULT_DEVICE_ID | 0 => Ok(()),
            other => Err(CaptureError::DeviceNotFound(other)),
        }
    }
}

impl CaptureBackend for MemoryBackend {
    fn open(&self, _handle: (), format: &AudioFormat, sink: FrameSink) -> Result<Box<dyn CaptureStream>, CaptureError> {
        format.validate()?;
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.started.store(false, Ordering::Release);
        *self.shared.sink.lock() = Some(sink);
        log::debug!("{} opened: {:?}", DEVICE_NAME, format);
        Ok(Box::new(MemoryStream {
            shared: Arc::clone(&self.shared),
            generation,
        }))
    }
}

struct MemoryStream {
    shared: Arc<Shared>,
    generation: u64,
}

impl MemoryStream {
    fn is_current(&self) -> bool {
        self.shared.generation.load(Ordering::Acquire) == self.generation
    }
}

impl CaptureStream for MemoryStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.shared.fail_start.load(Ordering::Relaxed) {
            return Err(CaptureError::DeviceStartFailed(format!("{} refused to start", DEVICE_NAME)));
        }
        if self.is_current() {
            self.shared.started.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if self.is_current() {
            self.shared.started.store(false, Ordering::Release);
        }
        Ok(())
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        if self.is_current() {
            self.shared.started.store(false, Ordering::Release);
            self.shared.sink.lock().take();
        }
    }
}

/// Pushes audio into a [`MemoryBackend`] device.
#[derive(Clone)]
pub struct MemoryFeeder {
    shared: Arc<Shared>,
}

impl MemoryFeeder {
    /// Deliver interleaved normalized samples. Returns `false` (dropping the
    /// samples) when the device is not started.
    pub fn push(&self, samples: &[f32]) -> bool {
        self.with_sink(|sink| sink.push(samples))
    }

    pub fn push_i16(&self, samples: &[i16]) -> bool {
        self.with_sink(|sink| sink.push_i16(samples))
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }

    fn with_sink(&self, push: impl FnOnce(&mut FrameSink)) -> bool {
        if !self.is_started() {
            return false;
        }
        match self.shared.sink.lock().as_mut() {
            Some(sink) => {
                push(sink);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::SampleFormat;
    use crate::processing::ring_buffer::RingBuffer;
    use crate::session::frame_sink::DiagnosticCounters;

    fn sink(ring: &Arc<RingBuffer>) -> FrameSink {
        FrameSink::new(Arc::clone(ring), Arc::new(DiagnosticCounters::default()))
    }

    #[test]
    fn resolves_default_and_index_zero() {
        let backend = MemoryBackend::new(1);
        assert!(backend.resolve(DEFAULT_DEVICE_ID).is_ok());
        assert!(backend.resolve(0).is_ok());
        assert_eq!(backend.resolve(3), Err(CaptureError::DeviceNotFound(3)));

        let devices = backend.list_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_default);
        assert_eq!(devices[0].channels, 1);
    }

    #[test]
    fn feeds_only_while_started() {
        let backend = MemoryBackend::new(1);
        let feeder = backend.feeder();
        let ring = Arc::new(RingBuffer::new(64, 1));
        let format = AudioFormat::new(SampleFormat::F32, 8000, 1);
        let mut stream = backend.open((), &format, sink(&ring)).unwrap();

        assert!(!feeder.push(&[0.1; 4]));
        stream.start().unwrap();
        assert!(feeder.push(&[0.1; 4]));
        stream.stop().unwrap();
        assert!(!feeder.push(&[0.1; 4]));
        assert_eq!(ring.write_seq(), 4);

        drop(stream);
        assert!(!feeder.is_started());
    }

    #[test]
    fn stale_stream_does_not_detach_newer_one() {
        let backend = MemoryBackend::new(1);
        let feeder = backend.feeder();
        let format = AudioFormat::new(SampleFormat::F32, 8000, 1);
        let old_ring = Arc::new(RingBuffer::new(64, 1));
        let new_ring = Arc::new(RingBuffer::new(64, 1));

        let old = backend.open((), &format, sink(&old_ring)).unwrap();
        let mut new = backend.open((), &format, sink(&new_ring)).unwrap();
        drop(old);
        new.start().unwrap();
        assert!(feeder.push(&[0.5; 2]));
        assert_eq!(new_ring.write_seq(), 2);
        assert_eq!(old_ring.write_seq(), 0);
    }

    #[test]
    fn start_failure_is_reported() {
        let backend = MemoryBackend::new(1);
        backend.set_fail_start(true);
        let ring = Arc::new(RingBuffer::new(64, 1));
        let format = AudioFormat::new(SampleFormat::F32, 8000, 1);
        let mut stream = backend.open((), &format, sink(&ring)).unwrap();
        assert!(matches!(stream.start(), Err(CaptureError::DeviceStartFailed(_))));
    }
}
