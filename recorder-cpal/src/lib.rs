//! # recorder-cpal
//!
//! Cross-platform hardware backend for `recorder-core` built on `cpal`.
//!
//! [`CpalBackend`] enumerates input devices through the default host and opens
//! them as real-time input streams feeding the engine's [`FrameSink`].
//!
//! ```text
//! recorder-cpal (this crate)
//! ├── device_catalog.rs  ← CpalBackend: DeviceCatalog + CaptureBackend
//! └── cpal_stream.rs     ← CpalStream: owns the cpal::Stream on its own thread
//! ```
//!
//! [`FrameSink`]: recorder_core::FrameSink

mod cpal_stream;
mod device_catalog;

pub use cpal_stream::CpalStream;
pub use device_catalog::{CpalBackend, CpalDevice};

#[cfg(test)]
mod tests {
    use super::*;
    use recorder_core::{AudioFormat, CaptureEngine, EngineConfig, SampleFormat, DEFAULT_DEVICE_ID};

    #[test]
    fn default_device_lifecycle_does_not_panic() {
        let mut engine = CaptureEngine::new(CpalBackend::new(), EngineConfig::default()).unwrap();
        if engine
            .init(DEFAULT_DEVICE_ID, AudioFormat::new(SampleFormat::F32, 44100, 1))
            .is_ok()
        {
            let _ = engine.start();
            engine.stop();
            engine.deinit();
        }
    }
}
