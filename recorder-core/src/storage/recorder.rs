use std::path::{Path, PathBuf};

use crate::models::audio_models::AudioFormat;
use crate::models::error::CaptureError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::processing::pre_roll::PreRollBuffer;
use crate::processing::sample_codec;

use super::metadata;
use super::wav_writer::WavFileWriter;

/// File-backed recording session driven by the processing step.
struct RecordingSession {
    writer: WavFileWriter,
    paused: bool,
    pre_roll: PreRollBuffer,
    was_silent: bool,
    frames_since_flush: u64,
    write_error: Option<CaptureError>,
}

/// Owns at most one active recording.
///
/// Blocks arrive already filtered. While the detector reports silence they go
/// to a bounded pre-roll buffer instead of the file; the buffer is written
/// ahead of the first block of the next sound.
#[derive(Default)]
pub struct Recorder {
    session: Option<RecordingSession>,
    encoded: Vec<u8>,
    drained: Vec<f32>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.paused)
    }

    /// Open `path` and start a session in `format`.
    pub fn start(&mut self, path: &Path, format: AudioFormat, pre_roll_secs: f32) -> Result<(), CaptureError> {
        if self.session.is_some() {
            return Err(CaptureError::FailedToInitializeRecording("a recording is already in progress".into()));
        }
        validate_path(path)?;

        let writer = WavFileWriter::create(path.to_path_buf(), format)?;
        self.session = Some(RecordingSession {
            writer,
            paused: false,
            pre_roll: PreRollBuffer::for_duration(pre_roll_secs, format.sample_rate, format.channels),
            was_silent: false,
            frames_since_flush: 0,
            write_error: None,
        });
        log::info!("recording started: {}", path.display());
        Ok(())
    }

    /// Suspend or resume appends. No-op without an active session.
    pub fn set_paused(&mut self, paused: bool) {
        if let Some(session) = self.session.as_mut() {
            if session.paused != paused {
                log::info!("recording {}", if paused { "paused" } else { "resumed" });
            }
            session.paused = paused;
        }
    }

    /// Resize the pre-roll window, dropping whatever it held.
    pub fn set_pre_roll_secs(&mut self, seconds: f32) {
        if let Some(session) = self.session.as_mut() {
            let format = *session.writer.format();
            session.pre_roll = PreRollBuffer::for_duration(seconds, format.sample_rate, format.channels);
        }
    }

    /// Route one filtered block according to pause and silence state.
    ///
    /// Returns the write error, if any; the first one is also kept and
    /// reported again by [`stop`](Self::stop).
    pub fn write_block(&mut self, samples: &[f32], silent: bool) -> Result<(), CaptureError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.paused {
            return Ok(());
        }

        if silent {
            if !session.was_silent {
                session.pre_roll.clear();
                session.was_silent = true;
            }
            session.pre_roll.push(samples);
            return Ok(());
        }

        self.encoded.clear();
        let format = *session.writer.format();
        if session.was_silent {
            session.was_silent = false;
            self.drained.clear();
            session.pre_roll.drain_into(&mut self.drained);
            sample_codec::encode_into(&self.drained, format.sample_format, &mut self.encoded);
        }
        sample_codec::encode_into(samples, format.sample_format, &mut self.encoded);

        let frames = (self.encoded.len() / format.block_align()) as u64;
        let mut result = session.writer.write(&self.encoded);
        session.frames_since_flush += frames;
        if result.is_ok() && session.frames_since_flush >= format.sample_rate as u64 {
            session.frames_since_flush = 0;
            result = session.writer.flush();
        }

        if let Err(e) = &result {
            if session.write_error.is_none() {
                session.write_error = Some(e.clone());
            }
        }
        result
    }

    /// Finalize the active session. Returns `Ok(None)` when nothing was recording.
    ///
    /// The file is closed even when an earlier write failed; that failure is
    /// then returned as the error.
    pub fn stop(&mut self, write_sidecar: bool) -> Result<Option<RecordingResult>, CaptureError> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };
        let RecordingSession { writer, write_error, .. } = session;

        let file_path: PathBuf = writer.file_path().to_path_buf();
        let format = *writer.format();
        let frames_written = writer.frames_written();
        let checksum = writer.finalize()?;
        if let Some(e) = write_error {
            log::error!("recording {} finished with write errors", file_path.display());
            return Err(e);
        }

        let metadata = RecordingMetadata::new(format, frames_written, &file_path.to_string_lossy(), &checksum);
        if write_sidecar {
            metadata::write_metadata(&metadata, &file_path)?;
        }
        log::info!("recording stopped: {} ({} frames)", file_path.display(), frames_written);

        Ok(Some(RecordingResult {
            file_path,
            frames_written,
            duration_secs: format.frames_to_secs(frames_written),
            metadata,
            checksum,
        }))
    }
}

fn validate_path(path: &Path) -> Result<(), CaptureError> {
    if path.as_os_str().is_empty() {
        return Err(CaptureError::InvalidArguments("recording path is empty".into()));
    }
    if path.is_dir() || path.file_name().is_none() {
        return Err(CaptureError::InvalidArguments(format!("not a file path: {}", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::SampleFormat;
    use crate::processing::wav_format;

    fn format() -> AudioFormat {
        AudioFormat::new(SampleFormat::F32, 100, 1)
    }

    fn data_size(path: &Path) -> u32 {
        let bytes = std::fs::read(path).unwrap();
        wav_format::parse_wav_header(&bytes).unwrap().data_size
    }

    #[test]
    fn paused_blocks_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paused.wav");
        let mut recorder = Recorder::new();
        recorder.start(&path, format(), 0.0).unwrap();

        recorder.write_block(&[0.1; 10], false).unwrap();
        recorder.set_paused(true);
        assert!(recorder.is_paused());
        recorder.write_block(&[0.2; 30], false).unwrap();
        recorder.set_paused(false);
        recorder.write_block(&[0.3; 5], false).unwrap();

        let result = recorder.stop(false).unwrap().unwrap();
        assert_eq!(result.frames_written, 15);
        assert_eq!(data_size(&path), 15 * 4);
        assert!(!recorder.is_active());
    }

    #[test]
    fn header_tracks_periodic_flushes_while_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open.wav");
        let mut recorder = Recorder::new();
        recorder.start(&path, format(), 0.0).unwrap();

        recorder.write_block(&[0.1; 60], false).unwrap();
        assert_eq!(data_size(&path), 0);

        // Crossing one second of audio flushes and patches the header.
        recorder.write_block(&[0.1; 60], false).unwrap();
        assert_eq!(data_size(&path), 120 * 4);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            (wav_format::WAV_HEADER_SIZE + 120 * 4) as u64
        );

        recorder.write_block(&[0.1; 30], false).unwrap();
        assert_eq!(data_size(&path), 120 * 4);
        assert!(recorder.is_active());

        let result = recorder.stop(false).unwrap().unwrap();
        assert_eq!(result.frames_written, 150);
        assert_eq!(data_size(&path), 150 * 4);
    }

    #[test]
    fn second_start_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new();
        recorder.start(&dir.path().join("a.wav"), format(), 0.0).unwrap();
        assert!(matches!(
            recorder.start(&dir.path().join("b.wav"), format(), 0.0),
            Err(CaptureError::FailedToInitializeRecording(_))
        ));
    }

    #[test]
    fn invalid_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new();
        assert!(matches!(recorder.start(Path::new(""), format(), 0.0), Err(CaptureError::InvalidArguments(_))));
        assert!(matches!(recorder.start(dir.path(), format(), 0.0), Err(CaptureError::InvalidArguments(_))));
        assert!(!recorder.is_active());
    }

    #[test]
    fn stop_without_session_is_noop() {
        let mut recorder = Recorder::new();
        assert_eq!(recorder.stop(false), Ok(None));
        recorder.set_paused(true);
        assert!(!recorder.is_paused());
    }

    #[test]
    fn silence_is_skipped_and_pre_roll_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gated.wav");
        let mut recorder = Recorder::new();
        // 0.05 s at 100 Hz keeps the last 5 frames.
        recorder.start(&path, format(), 0.05).unwrap();

        recorder.write_block(&[0.5; 10], false).unwrap();
        let silent: Vec<f32> = (0..20).map(|i| i as f32 / 100.0).collect();
        recorder.write_block(&silent, true).unwrap();
        recorder.write_block(&[0.9; 3], false).unwrap();
        let result = recorder.stop(false).unwrap().unwrap();

        assert_eq!(result.frames_written, 10 + 5 + 3);
        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(&samples[10..15], &silent[15..20]);
        assert_eq!(samples[15], 0.9);
    }

    #[test]
    fn sidecar_is_written_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.wav");
        let mut recorder = Recorder::new();
        recorder.start(&path, format(), 0.0).unwrap();
        recorder.write_block(&[0.0; 100], false).unwrap();

        let result = recorder.stop(true).unwrap().unwrap();
        let stored = metadata::read_metadata(&path).unwrap();
        assert_eq!(stored.checksum, result.checksum);
        assert_eq!(result.duration_secs, 1.0);
    }
}
