use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::audio_models::EngineDiagnostics;
use crate::processing::ring_buffer::RingBuffer;
use crate::processing::sample_codec;

/// Counters shared between the device callback, the processing step and the engine.
#[derive(Debug, Default)]
pub struct DiagnosticCounters {
    pub(crate) frames_captured: AtomicU64,
    pub(crate) frames_processed: AtomicU64,
    pub(crate) frames_lost: AtomicU64,
    pub(crate) implicit_teardowns: AtomicU64,
    pub(crate) stream_blocks_delivered: AtomicU64,
    pub(crate) recording_write_failures: AtomicU64,
}

impl DiagnosticCounters {
    pub fn snapshot(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_lost: self.frames_lost.load(Ordering::Relaxed),
            implicit_teardowns: self.implicit_teardowns.load(Ordering::Relaxed),
            stream_blocks_delivered: self.stream_blocks_delivered.load(Ordering::Relaxed),
            recording_write_failures: self.recording_write_failures.load(Ordering::Relaxed),
        }
    }

    /// Zero the per-session counters. `implicit_teardowns` survives re-init.
    pub(crate) fn reset_session(&self) {
        self.frames_captured.store(0, Ordering::Relaxed);
        self.frames_processed.store(0, Ordering::Relaxed);
        self.frames_lost.store(0, Ordering::Relaxed);
        self.stream_blocks_delivered.store(0, Ordering::Relaxed);
        self.recording_write_failures.store(0, Ordering::Relaxed);
    }
}

/// Write end of the capture ring, handed to the backend's device callback.
///
/// Every `push_*` converts native samples to normalized `f32` directly into
/// ring slots and publishes them with one atomic store. Nothing here
/// allocates, locks or waits. There is exactly one sink per opened device.
#[derive(Debug)]
pub struct FrameSink {
    ring: Arc<RingBuffer>,
    counters: Arc<DiagnosticCounters>,
}

impl FrameSink {
    pub(crate) fn new(ring: Arc<RingBuffer>, counters: Arc<DiagnosticCounters>) -> Self {
        Self { ring, counters }
    }

    pub fn channels(&self) -> usize {
        self.ring.channels()
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.publish(samples.iter().copied());
    }

    pub fn push_u8(&mut self, samples: &[u8]) {
        self.publish(samples.iter().map(|&s| sample_codec::u8_to_f32(s)));
    }

    pub fn push_i16(&mut self, samples: &[i16]) {
        self.publish(samples.iter().map(|&s| sample_codec::i16_to_f32(s)));
    }

    pub fn push_i32(&mut self, samples: &[i32]) {
        self.publish(samples.iter().map(|&s| sample_codec::i32_to_f32(s)));
    }

    fn publish<I: ExactSizeIterator<Item = f32>>(&mut self, samples: I) {
        let written = self.ring.write(samples);
        self.counters
            .frames_captured
            .fetch_add((written / self.ring.channels()) as u64, Ordering::Relaxed);
    }
}
