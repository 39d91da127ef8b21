use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::filters::{FilterChain, FilterKind};
use crate::models::audio_models::{AudioFormat, CaptureDevice, EngineDiagnostics, SilenceState};
use crate::models::config::{EngineConfig, ProcessingMode, MAX_PRE_ROLL_SECS};
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::EngineState;
use crate::processing::ring_buffer::RingBuffer;
use crate::processing::sample_codec::FLOOR_DB;
use crate::processing::silence::DetectorSettings;
use crate::processing::spectrum::{AnalysisWindow, SpectralAnalyzer, ANALYSIS_SIZE, TEXTURE_ROWS, TEXTURE_WIDTH};
use crate::traits::capture_backend::{CaptureBackend, CaptureStream};

use super::dispatcher::{EventDispatcher, SilenceCallback, StreamCallback};
use super::frame_sink::{DiagnosticCounters, FrameSink};
use super::processor::{Pipeline, SharedSettings, PROCESS_BLOCK_FRAMES};

/// Background processing thread.
struct Worker {
    running: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// An opened device plus everything downstream of it.
struct Session {
    pipeline: Arc<Pipeline>,
    stream: Box<dyn CaptureStream>,
    worker: Option<Worker>,
}

/// Real-time capture engine.
///
/// Owns one input device at a time and runs captured audio through the filter
/// chain into the analyzer, the silence detector, the recorder and the stream
/// feed.
///
/// ```text
/// uninitialized --init--> stopped --start--> started
///       ^                   |  ^                |
///       +------deinit-------+  +------stop------+
/// ```
///
/// Lifecycle operations take `&mut self`; queries, setters, filters and
/// recording control take `&self` so a host can share the engine behind a
/// read lock while one owner drives the lifecycle.
pub struct CaptureEngine<B: CaptureBackend> {
    backend: B,
    config: EngineConfig,
    state: EngineState,
    session: Option<Session>,
    settings: SharedSettings,
    dispatcher: Arc<EventDispatcher>,
    counters: Arc<DiagnosticCounters>,
    analyzer: Mutex<SpectralAnalyzer>,
}

impl<B: CaptureBackend> CaptureEngine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Result<Self, CaptureError> {
        config.validate()?;
        let settings = DetectorSettings {
            enabled: config.silence_detection,
            threshold_db: config.silence_threshold_db,
            duration_secs: config.silence_duration_secs,
            pre_roll_secs: config.seconds_of_audio_to_write_before,
        };
        let analyzer = SpectralAnalyzer::new(config.fft_smoothing, config.always_return_data);
        Ok(Self {
            backend,
            config,
            state: EngineState::Uninitialized,
            session: None,
            settings: Arc::new(RwLock::new(Arc::new(settings))),
            dispatcher: Arc::new(EventDispatcher::new()),
            counters: Arc::new(DiagnosticCounters::default()),
            analyzer: Mutex::new(analyzer),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    pub fn is_started(&self) -> bool {
        self.state.is_started()
    }

    /// Format of the open session.
    pub fn format(&self) -> Option<AudioFormat> {
        self.session.as_ref().map(|s| s.pipeline.format)
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.counters.snapshot()
    }

    pub fn list_devices(&self) -> Result<Vec<CaptureDevice>, CaptureError> {
        self.backend.list_devices()
    }

    // --- Lifecycle ---

    /// Open `device_id` in `format`.
    ///
    /// An engine that is already initialized is torn down first, including
    /// any active recording. That is logged and counted in
    /// [`EngineDiagnostics::implicit_teardowns`].
    pub fn init(&mut self, device_id: i32, format: AudioFormat) -> Result<(), CaptureError> {
        format.validate()?;

        if self.state.is_initialized() {
            log::warn!("init called on an initialized engine, tearing down the previous session");
            self.counters.implicit_teardowns.fetch_add(1, Ordering::Relaxed);
            self.deinit();
        }

        let handle = self.backend.resolve(device_id)?;

        let frames = (self.config.ring_buffer_secs as f64 * format.sample_rate as f64) as usize;
        let raw = Arc::new(RingBuffer::new(frames.max(PROCESS_BLOCK_FRAMES * 4), format.channels));
        self.counters.reset_session();
        let sink = FrameSink::new(Arc::clone(&raw), Arc::clone(&self.counters));

        let stream = self.backend.open(handle, &format, sink)?;
        let pipeline = Arc::new(Pipeline::new(
            format,
            raw,
            Arc::clone(&self.settings),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.counters),
        ));

        self.analyzer.lock().reset();
        self.session = Some(Session {
            pipeline,
            stream,
            worker: None,
        });
        self.state = EngineState::Stopped;
        log::info!(
            "capture initialized: device {} {:?} {} Hz x{}",
            device_id,
            format.sample_format,
            format.sample_rate,
            format.channels
        );
        Ok(())
    }

    /// Stop, finalize any recording and close the device.
    pub fn deinit(&mut self) {
        if !self.state.is_initialized() {
            return;
        }
        self.stop();
        if let Some(session) = self.session.take() {
            if let Err(e) = session.pipeline.recorder.lock().stop(self.config.write_metadata_sidecar) {
                log::error!("failed to finalize recording on deinit: {}", e);
            }
            // Dropping the stream closes the device and joins the backend thread.
            drop(session);
        }
        self.state = EngineState::Uninitialized;
        log::info!("capture deinitialized");
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        let session = match self.state {
            EngineState::Uninitialized => return Err(CaptureError::NotInitialized),
            EngineState::Started => return Ok(()),
            EngineState::Stopped => self.session.as_mut().ok_or(CaptureError::NotInitialized)?,
        };

        // Filter state from a previous run must not bleed into this one.
        session.pipeline.filters.lock().reset();
        session.stream.start()?;

        if self.config.processing_mode == ProcessingMode::Background {
            let running = Arc::new(AtomicBool::new(true));
            let pipeline = Arc::clone(&session.pipeline);
            let flag = Arc::clone(&running);
            let interval = Duration::from_millis(self.config.processing_interval_ms);
            let spawned = thread::Builder::new().name("capture-processing".into()).spawn(move || {
                while flag.load(Ordering::Acquire) {
                    pipeline.step();
                    thread::sleep(interval);
                }
                pipeline.step();
            });
            match spawned {
                Ok(handle) => session.worker = Some(Worker { running, handle }),
                Err(e) => {
                    if let Err(stop_err) = session.stream.stop() {
                        log::warn!("failed to stop device after worker spawn failure: {}", stop_err);
                    }
                    return Err(CaptureError::DeviceStartFailed(format!("failed to spawn processing thread: {}", e)));
                }
            }
        }

        self.state = EngineState::Started;
        log::info!("capture started");
        Ok(())
    }

    /// Stop the device and drain pending audio. Safe to call in any state.
    pub fn stop(&mut self) {
        if !self.state.is_started() {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.stream.stop() {
                log::warn!("device stop reported an error: {}", e);
            }
            if let Some(worker) = session.worker.take() {
                worker.running.store(false, Ordering::Release);
                if worker.handle.join().is_err() {
                    log::error!("processing thread panicked");
                }
            }
            session.pipeline.step();
        }
        self.state = EngineState::Stopped;
        log::info!("capture stopped");
    }

    /// Run the processing step on the calling thread.
    ///
    /// Required in [`ProcessingMode::Manual`]; harmless otherwise.
    /// Returns the number of frames processed.
    pub fn pump(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.pipeline.step())
    }

    // --- Streaming ---

    pub fn start_streaming_data(&self) -> Result<(), CaptureError> {
        self.pipeline()?.set_streaming(true);
        Ok(())
    }

    pub fn stop_streaming_data(&self) {
        if let Some(session) = self.session.as_ref() {
            session.pipeline.set_streaming(false);
        }
    }

    /// Callback for encoded stream blocks; `None` removes it.
    pub fn set_stream_callback(&self, callback: Option<StreamCallback>) {
        self.dispatcher.set_stream_callback(callback);
    }

    pub fn subscribe_stream(&self) -> crossbeam_channel::Receiver<Vec<u8>> {
        self.dispatcher.subscribe_stream()
    }

    // --- Recording ---

    pub fn start_recording(&self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        match self.state {
            EngineState::Uninitialized => return Err(CaptureError::NotInitialized),
            EngineState::Stopped => return Err(CaptureError::NotStarted),
            EngineState::Started => {}
        }
        let pipeline = self.pipeline()?;
        let pre_roll_secs = pipeline.settings().pre_roll_secs;
        pipeline.recorder.lock().start(path.as_ref(), pipeline.format, pre_roll_secs)
    }

    /// Suspend or resume the recording. Audio captured before the call is
    /// processed first, so the switch lands at the current position.
    pub fn set_pause_recording(&self, pause: bool) {
        if let Some(session) = self.session.as_ref() {
            self.drain(session);
            session.pipeline.recorder.lock().set_paused(pause);
        }
    }

    /// Finalize the active recording. `Ok(None)` when nothing was recording.
    pub fn stop_recording(&self) -> Result<Option<RecordingResult>, CaptureError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(None);
        };
        self.drain(session);
        session.pipeline.recorder.lock().stop(self.config.write_metadata_sidecar)
    }

    // --- Silence detection ---

    /// Enable or disable detection. `callback` replaces the registered
    /// silence callback; channel subscribers are unaffected.
    pub fn set_silence_detection(&self, enable: bool, callback: Option<SilenceCallback>) {
        self.dispatcher.set_silence_callback(callback);
        self.update_settings(|s| s.enabled = enable);
    }

    pub fn subscribe_silence(&self) -> crossbeam_channel::Receiver<SilenceState> {
        self.dispatcher.subscribe_silence()
    }

    pub fn set_silence_threshold_db(&self, decibel: f32) -> Result<(), CaptureError> {
        if !decibel.is_finite() {
            return Err(CaptureError::InvalidArguments(format!("invalid silence threshold: {}", decibel)));
        }
        self.update_settings(|s| s.threshold_db = decibel);
        Ok(())
    }

    pub fn set_silence_duration(&self, seconds: f32) -> Result<(), CaptureError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(CaptureError::InvalidArguments(format!("invalid silence duration: {}", seconds)));
        }
        self.update_settings(|s| s.duration_secs = seconds);
        Ok(())
    }

    pub fn set_seconds_of_audio_to_write_before(&self, seconds: f32) -> Result<(), CaptureError> {
        if !(0.0..=MAX_PRE_ROLL_SECS).contains(&seconds) {
            return Err(CaptureError::InvalidArguments(format!("invalid pre-roll length: {}", seconds)));
        }
        self.update_settings(|s| s.pre_roll_secs = seconds);
        if let Some(session) = self.session.as_ref() {
            session.pipeline.recorder.lock().set_pre_roll_secs(seconds);
        }
        Ok(())
    }

    // --- Analysis ---

    /// 256 FFT magnitudes; zeros unless started with `F32` samples.
    pub fn get_fft(&self) -> [f32; ANALYSIS_SIZE] {
        match self.analysis_window() {
            Some(window) => self.analyzer.lock().fft(&window),
            None => [0.0; ANALYSIS_SIZE],
        }
    }

    /// 256 waveform samples; zeros unless started with `F32` samples.
    pub fn get_wave(&self) -> [f32; ANALYSIS_SIZE] {
        match self.analysis_window() {
            Some(window) => self.analyzer.lock().wave(&window),
            None => [0.0; ANALYSIS_SIZE],
        }
    }

    pub fn get_texture(&self) -> Vec<f32> {
        match self.analysis_window() {
            Some(window) => self.analyzer.lock().texture(&window),
            None => vec![0.0; TEXTURE_WIDTH],
        }
    }

    pub fn get_texture_2d(&self) -> Vec<f32> {
        match self.analysis_window() {
            Some(window) => self.analyzer.lock().texture_2d(&window),
            None => vec![0.0; TEXTURE_ROWS * TEXTURE_WIDTH],
        }
    }

    pub fn get_texture_value(&self, row: usize, column: usize) -> f32 {
        self.analyzer.lock().texture_value(row, column)
    }

    /// Loudness of the latest analysis window; -100 dB unless started with `F32` samples.
    pub fn get_volume_db(&self) -> f32 {
        self.analysis_window().map_or(FLOOR_DB, |w| w.volume_db())
    }

    pub fn set_fft_smoothing(&self, smoothing: f32) {
        self.analyzer.lock().set_smoothing(smoothing);
    }

    // --- Filters ---

    pub fn add_filter(&self, kind: FilterKind) -> Result<(), CaptureError> {
        self.pipeline()?.filters.lock().add(kind)
    }

    pub fn remove_filter(&self, kind: FilterKind) -> Result<(), CaptureError> {
        self.pipeline()?.filters.lock().remove(kind)
    }

    /// Position of `kind` in the chain, or -1 when inactive.
    pub fn is_filter_active(&self, kind: FilterKind) -> Result<i32, CaptureError> {
        Ok(self.pipeline()?.filters.lock().is_active(kind))
    }

    pub fn filter_parameter_names(&self, kind: FilterKind) -> Vec<String> {
        FilterChain::parameter_names(kind)
    }

    pub fn get_filter_parameter(&self, kind: FilterKind, id: usize) -> Result<f32, CaptureError> {
        self.pipeline()?.filters.lock().get_parameter(kind, id)
    }

    pub fn set_filter_parameter(&self, kind: FilterKind, id: usize, value: f32) -> Result<(), CaptureError> {
        self.pipeline()?.filters.lock().set_parameter(kind, id, value)
    }

    // --- Internals ---

    fn pipeline(&self) -> Result<&Pipeline, CaptureError> {
        self.session
            .as_ref()
            .map(|s| s.pipeline.as_ref())
            .ok_or(CaptureError::NotInitialized)
    }

    fn analysis_window(&self) -> Option<AnalysisWindow> {
        if !self.state.is_started() {
            return None;
        }
        let pipeline = &self.session.as_ref()?.pipeline;
        pipeline.format.is_float().then(|| AnalysisWindow::capture(&pipeline.filtered))
    }

    fn update_settings(&self, apply: impl FnOnce(&mut DetectorSettings)) {
        let mut settings = self.settings.write();
        let mut next = **settings;
        apply(&mut next);
        *settings = Arc::new(next);
    }

    /// Process captured audio before a recording control takes effect.
    fn drain(&self, session: &Session) {
        if self.state.is_started() {
            session.pipeline.step();
        }
    }
}

impl<B: CaptureBackend> Drop for CaptureEngine<B> {
    fn drop(&mut self) {
        self.deinit();
    }
}
