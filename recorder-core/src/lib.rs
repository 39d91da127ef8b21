//! # recorder-core
//!
//! Platform-agnostic real-time audio capture engine.
//!
//! Provides the lock-free capture ring, in-place filters, spectral analysis,
//! silence detection, WAV recording and event fan-out. Platform backends
//! implement [`CaptureBackend`] and plug into the generic [`CaptureEngine`].
//!
//! ## Architecture
//!
//! ```text
//! recorder-core (this crate)
//! ├── traits/       ← DeviceCatalog, CaptureBackend, CaptureStream, AudioFilter
//! ├── models/       ← CaptureError, ErrorCode, EngineState, EngineConfig, AudioFormat, etc.
//! ├── processing/   ← RingBuffer, PreRollBuffer, sample codec, SpectralAnalyzer, SilenceDetector, WAV header
//! ├── filters/      ← FilterChain, AutoGain, EchoCancellation
//! ├── session/      ← CaptureEngine, FrameSink, processing step, EventDispatcher
//! ├── storage/      ← Recorder, WavFileWriter, metadata sidecar
//! └── providers/    ← MemoryBackend (host-fed device)
//! ```

pub mod filters;
pub mod models;
pub mod processing;
pub mod providers;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use filters::{FilterChain, FilterKind};
pub use models::audio_models::{
    AudioFormat, CaptureDevice, EngineDiagnostics, SampleFormat, SilenceState, DEFAULT_DEVICE_ID, MAX_CHANNELS,
    MAX_SAMPLE_RATE,
};
pub use models::config::{EngineConfig, ProcessingMode, MAX_PRE_ROLL_SECS, MAX_RING_BUFFER_SECS};
pub use models::error::{CaptureError, ErrorCode};
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::EngineState;
pub use processing::ring_buffer::RingBuffer;
pub use processing::spectrum::{SpectralAnalyzer, ANALYSIS_SIZE, TEXTURE_ROWS, TEXTURE_WIDTH};
pub use providers::memory::{MemoryBackend, MemoryFeeder};
pub use session::dispatcher::{SilenceCallback, StreamCallback};
pub use session::engine::CaptureEngine;
pub use session::frame_sink::FrameSink;
pub use session::processor::{PROCESS_BLOCK_FRAMES, STREAM_BLOCK_FRAMES};
pub use traits::capture_backend::{CaptureBackend, CaptureStream, DeviceCatalog};
pub use traits::filter::{AudioFilter, ParamInfo};
