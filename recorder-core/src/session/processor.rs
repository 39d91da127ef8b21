use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::filters::FilterChain;
use crate::models::audio_models::{AudioFormat, SilenceState};
use crate::processing::ring_buffer::{RingBuffer, RingReader};
use crate::processing::sample_codec;
use crate::processing::silence::{DetectorSettings, SilenceDetector};
use crate::storage::recorder::Recorder;

use super::dispatcher::EventDispatcher;
use super::frame_sink::DiagnosticCounters;

/// Frames pulled from the capture ring per processed block.
pub const PROCESS_BLOCK_FRAMES: usize = 1024;

/// Frames per delivered stream block.
pub const STREAM_BLOCK_FRAMES: usize = 2048;

/// Settings snapshot shared by the engine and the processing step.
pub(crate) type SharedSettings = Arc<RwLock<Arc<DetectorSettings>>>;

/// State owned by whoever currently runs the processing step.
struct StepState {
    reader: RingReader,
    block: Vec<f32>,
    detector: SilenceDetector,
    pending_stream: Vec<f32>,
}

/// Events produced by one block, dispatched once the step lock is released.
#[derive(Default)]
struct BlockEvents {
    frames: usize,
    edge: Option<SilenceState>,
    stream: Vec<Vec<u8>>,
}

/// Everything downstream of the capture ring for one initialized session.
///
/// ```text
/// [device] -> FrameSink -> raw ring -> step: FilterChain -> filtered ring -> analyzer
///                                            |-> SilenceDetector -> dispatcher
///                                            |-> Recorder
///                                            '-> stream feed -> dispatcher
/// ```
pub(crate) struct Pipeline {
    pub(crate) format: AudioFormat,
    pub(crate) raw: Arc<RingBuffer>,
    pub(crate) filtered: RingBuffer,
    pub(crate) filters: Mutex<FilterChain>,
    pub(crate) recorder: Mutex<Recorder>,
    pub(crate) streaming: AtomicBool,
    settings: SharedSettings,
    dispatcher: Arc<EventDispatcher>,
    counters: Arc<DiagnosticCounters>,
    step_state: Mutex<StepState>,
}

impl Pipeline {
    pub(crate) fn new(
        format: AudioFormat,
        raw: Arc<RingBuffer>,
        settings: SharedSettings,
        dispatcher: Arc<EventDispatcher>,
        counters: Arc<DiagnosticCounters>,
    ) -> Self {
        let channels = format.channels as usize;
        let filtered = RingBuffer::new(raw.capacity() / channels, format.channels);
        let reader = raw.reader();
        Self {
            format,
            raw,
            filtered,
            filters: Mutex::new(FilterChain::new(format.sample_rate)),
            recorder: Mutex::new(Recorder::new()),
            streaming: AtomicBool::new(false),
            settings,
            dispatcher,
            counters,
            step_state: Mutex::new(StepState {
                reader,
                block: Vec::with_capacity(PROCESS_BLOCK_FRAMES * channels),
                detector: SilenceDetector::new(),
                pending_stream: Vec::with_capacity(STREAM_BLOCK_FRAMES * channels * 2),
            }),
        }
    }

    pub(crate) fn settings(&self) -> Arc<DetectorSettings> {
        Arc::clone(&self.settings.read())
    }

    pub(crate) fn set_streaming(&self, enabled: bool) {
        self.streaming.store(enabled, Ordering::Release);
    }

    /// Process everything published to the capture ring so far.
    ///
    /// Callbacks run between blocks with no pipeline lock held, so they may
    /// call back into the engine (pausing the recording on a silence edge,
    /// for instance). Returns the number of frames processed.
    pub(crate) fn step(&self) -> usize {
        let settings = self.settings();
        let detect = settings.enabled && self.format.is_float();

        let mut processed = 0;
        loop {
            let events = self.step_block(&settings, detect);
            if let Some(edge) = events.edge {
                self.dispatcher.emit_silence(edge);
            }
            for block in &events.stream {
                self.dispatcher.emit_stream(block);
                self.counters.stream_blocks_delivered.fetch_add(1, Ordering::Relaxed);
            }
            if events.frames == 0 {
                break;
            }
            processed += events.frames;
        }
        processed
    }

    fn step_block(&self, settings: &DetectorSettings, detect: bool) -> BlockEvents {
        let mut guard = self.step_state.lock();
        let state = &mut *guard;
        let channels = self.format.channels as usize;
        let mut events = BlockEvents::default();

        if !detect && state.detector.is_silent() {
            // Subscribers are told silence is over before the detector forgets it.
            events.edge = Some(SilenceState {
                is_silent: false,
                decibel: state.detector.state().decibel,
            });
            log::info!("silence detection disabled while silent, reporting sound");
            state.detector.reset();
        }

        state.block.clear();
        let outcome = self.raw.read(&mut state.reader, &mut state.block, PROCESS_BLOCK_FRAMES * channels);
        if outcome.lost > 0 {
            let frames = outcome.lost / channels as u64;
            self.counters.frames_lost.fetch_add(frames, Ordering::Relaxed);
            log::debug!("processing fell behind, {} frames lost", frames);
        }
        if outcome.copied == 0 {
            return events;
        }
        let frames = outcome.copied / channels;

        // Filters see whole blocks; chain changes land between blocks.
        self.filters.lock().process(&mut state.block, channels);
        self.filtered.write(state.block.iter().copied());

        let mut silent = false;
        if detect {
            let decibel = state.detector.measure(&state.block);
            let block_secs = self.format.frames_to_secs(frames as u64);
            if let Some(edge) = state.detector.update(decibel, block_secs, settings) {
                log::info!("silence {} at {:.1} dB", if edge.is_silent { "started" } else { "ended" }, edge.decibel);
                events.edge = Some(edge);
            }
            silent = state.detector.is_silent();
        }

        if let Err(e) = self.recorder.lock().write_block(&state.block, silent) {
            self.counters.recording_write_failures.fetch_add(1, Ordering::Relaxed);
            log::error!("recording write failed: {}", e);
        }

        if self.streaming.load(Ordering::Acquire) {
            events.stream = self.feed_stream(state);
        } else {
            state.pending_stream.clear();
        }

        self.counters.frames_processed.fetch_add(frames as u64, Ordering::Relaxed);
        events.frames = frames;
        events
    }

    /// Encode every complete stream block accumulated so far.
    fn feed_stream(&self, state: &mut StepState) -> Vec<Vec<u8>> {
        let chunk = STREAM_BLOCK_FRAMES * self.format.channels as usize;
        state.pending_stream.extend_from_slice(&state.block);
        if state.pending_stream.len() < chunk {
            return Vec::new();
        }
        if !self.dispatcher.has_stream_consumers() {
            state.pending_stream.clear();
            return Vec::new();
        }

        let mut blocks = Vec::new();
        let mut offset = 0;
        while state.pending_stream.len() - offset >= chunk {
            let mut bytes = Vec::with_capacity(STREAM_BLOCK_FRAMES * self.format.block_align());
            sample_codec::encode_into(
                &state.pending_stream[offset..offset + chunk],
                self.format.sample_format,
                &mut bytes,
            );
            blocks.push(bytes);
            offset += chunk;
        }
        state.pending_stream.drain(..offset);
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterKind;
    use crate::models::audio_models::SampleFormat;
    use crate::session::frame_sink::FrameSink;

    fn pipeline(format: AudioFormat, settings: DetectorSettings) -> (Pipeline, FrameSink, Arc<EventDispatcher>) {
        let raw = Arc::new(RingBuffer::new(format.sample_rate as usize * 2, format.channels));
        let counters = Arc::new(DiagnosticCounters::default());
        let dispatcher = Arc::new(EventDispatcher::new());
        let sink = FrameSink::new(Arc::clone(&raw), Arc::clone(&counters));
        let pipeline = Pipeline::new(
            format,
            raw,
            Arc::new(RwLock::new(Arc::new(settings))),
            Arc::clone(&dispatcher),
            counters,
        );
        (pipeline, sink, dispatcher)
    }

    #[test]
    fn step_moves_audio_to_filtered_ring() {
        let (pipeline, mut sink, _) = pipeline(AudioFormat::new(SampleFormat::F32, 8000, 2), DetectorSettings::default());
        sink.push(&vec![0.25; 3000 * 2]);

        assert_eq!(pipeline.step(), 3000);
        assert_eq!(pipeline.filtered.write_seq(), 6000);
        assert_eq!(pipeline.step(), 0);
        assert_eq!(pipeline.counters.snapshot().frames_processed, 3000);
    }

    #[test]
    fn filters_run_before_consumers() {
        let (pipeline, mut sink, _) = pipeline(AudioFormat::new(SampleFormat::F32, 1000, 1), DetectorSettings::default());
        {
            let mut filters = pipeline.filters.lock();
            filters.add(FilterKind::EchoCancellation).unwrap();
            filters.set_parameter(FilterKind::EchoCancellation, 0, 1.0).unwrap();
            filters.set_parameter(FilterKind::EchoCancellation, 1, 1.0).unwrap();
        }
        sink.push(&[0.5, 0.5, 0.5]);
        pipeline.step();

        let mut latest = [0.0f32; 3];
        pipeline.filtered.latest(&mut latest);
        assert_eq!(latest, [0.5, 0.0, 0.0]);
    }

    #[test]
    fn stream_blocks_are_fixed_size() {
        let (pipeline, mut sink, dispatcher) = pipeline(AudioFormat::new(SampleFormat::S16, 8000, 1), DetectorSettings::default());
        let rx = dispatcher.subscribe_stream();
        pipeline.set_streaming(true);

        sink.push(&vec![0.5; STREAM_BLOCK_FRAMES * 2 + 100]);
        pipeline.step();

        let blocks: Vec<Vec<u8>> = rx.try_iter().collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.len() == STREAM_BLOCK_FRAMES * 2));
        assert_eq!(i16::from_le_bytes([blocks[0][0], blocks[0][1]]), 16383);
    }

    #[test]
    fn silence_edges_are_dispatched() {
        let settings = DetectorSettings {
            enabled: true,
            threshold_db: -40.0,
            duration_secs: 0.5,
            pre_roll_secs: 0.0,
        };
        let (pipeline, mut sink, dispatcher) = pipeline(AudioFormat::new(SampleFormat::F32, 4096, 1), settings);
        let rx = dispatcher.subscribe_silence();

        sink.push(&vec![0.5; 4096]);
        pipeline.step();
        sink.push(&vec![0.0; 8192]);
        pipeline.step();
        sink.push(&vec![0.5; 1024]);
        pipeline.step();

        let edges: Vec<bool> = rx.try_iter().map(|s| s.is_silent).collect();
        assert_eq!(edges, vec![true, false]);
    }

    #[test]
    fn disabling_detection_while_silent_reports_sound() {
        let settings = DetectorSettings {
            enabled: true,
            duration_secs: 0.0,
            ..Default::default()
        };
        let (pipeline, mut sink, dispatcher) = pipeline(AudioFormat::new(SampleFormat::F32, 4096, 1), settings);
        let rx = dispatcher.subscribe_silence();

        sink.push(&vec![0.0; 1024]);
        pipeline.step();
        *pipeline.settings.write() = Arc::new(DetectorSettings {
            enabled: false,
            ..settings
        });
        sink.push(&vec![0.0; 1024]);
        assert_eq!(pipeline.step(), 1024);
        pipeline.step();

        let edges: Vec<bool> = rx.try_iter().map(|s| s.is_silent).collect();
        assert_eq!(edges, vec![true, false]);
    }

    #[test]
    fn detection_ignored_for_integer_formats() {
        let settings = DetectorSettings {
            enabled: true,
            duration_secs: 0.0,
            ..Default::default()
        };
        let (pipeline, mut sink, dispatcher) = pipeline(AudioFormat::new(SampleFormat::S16, 4096, 1), settings);
        let rx = dispatcher.subscribe_silence();
        sink.push(&vec![0.0; 4096]);
        pipeline.step();
        assert!(rx.try_recv().is_err());
    }
}
