use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Longest capture ring a config may ask for, in seconds.
pub const MAX_RING_BUFFER_SECS: f32 = 60.0;

/// Longest pre-roll window, in seconds.
pub const MAX_PRE_ROLL_SECS: f32 = 60.0;

/// Where the processing step (filters, detector, recorder, stream feed) runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// A dedicated worker thread, started with the device and joined on stop.
    #[default]
    Background,
    /// The host calls `CaptureEngine::pump` itself.
    Manual,
}

/// Configuration for a capture engine.
///
/// Runtime setters on the engine update the live copy; this struct only
/// provides the starting values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether silence detection starts enabled (default: false).
    pub silence_detection: bool,

    /// Level below which audio counts as silence, in dB (default: -40).
    pub silence_threshold_db: f32,

    /// Seconds the level must stay below the threshold (default: 2.0).
    pub silence_duration_secs: f32,

    /// Seconds of audio kept during silence and written when sound resumes (default: 0).
    pub seconds_of_audio_to_write_before: f32,

    /// FFT temporal smoothing in [0, 1] (default: 0, no smoothing).
    pub fft_smoothing: f32,

    /// Re-emit the last analysis snapshot when no new data arrived (default: true).
    pub always_return_data: bool,

    /// Ring buffer length in seconds of audio (default: 2.0).
    pub ring_buffer_secs: f32,

    pub processing_mode: ProcessingMode,

    /// Background worker poll interval (default: 10 ms).
    pub processing_interval_ms: u64,

    /// Write `<recording>.metadata.json` next to finished recordings (default: false).
    pub write_metadata_sidecar: bool,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !self.silence_threshold_db.is_finite() {
            return Err(CaptureError::InvalidArguments("silence threshold must be finite".into()));
        }
        if !(self.silence_duration_secs >= 0.0) {
            return Err(CaptureError::InvalidArguments(format!(
                "silence duration must be non-negative: {}",
                self.silence_duration_secs
            )));
        }
        if !(0.0..=MAX_PRE_ROLL_SECS).contains(&self.seconds_of_audio_to_write_before) {
            return Err(CaptureError::InvalidArguments(format!(
                "pre-roll seconds must be within [0, {}]: {}",
                MAX_PRE_ROLL_SECS,
                self.seconds_of_audio_to_write_before
            )));
        }
        if !(0.0..=1.0).contains(&self.fft_smoothing) {
            return Err(CaptureError::InvalidArguments(format!(
                "fft smoothing must be within [0, 1]: {}",
                self.fft_smoothing
            )));
        }
        if !(self.ring_buffer_secs > 0.0 && self.ring_buffer_secs <= MAX_RING_BUFFER_SECS) {
            return Err(CaptureError::InvalidArguments(format!(
                "ring buffer length must be within (0, {}] seconds: {}",
                MAX_RING_BUFFER_SECS, self.ring_buffer_secs
            )));
        }
        if self.processing_interval_ms == 0 {
            return Err(CaptureError::InvalidArguments("processing interval must be positive".into()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            silence_detection: false,
            silence_threshold_db: -40.0,
            silence_duration_secs: 2.0,
            seconds_of_audio_to_write_before: 0.0,
            fft_smoothing: 0.0,
            always_return_data: true,
            ring_buffer_secs: 2.0,
            processing_mode: ProcessingMode::Background,
            processing_interval_ms: 10,
            write_metadata_sidecar: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.silence_threshold_db, -40.0);
        assert_eq!(config.silence_duration_secs, 2.0);
    }

    #[test]
    fn rejects_out_of_range_smoothing() {
        let config = EngineConfig {
            fft_smoothing: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CaptureError::InvalidArguments(_))));
    }

    #[test]
    fn rejects_nan_duration() {
        let config = EngineConfig {
            silence_duration_secs: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unbounded_buffers() {
        let ring = EngineConfig {
            ring_buffer_secs: f32::INFINITY,
            ..Default::default()
        };
        assert!(matches!(ring.validate(), Err(CaptureError::InvalidArguments(_))));

        let pre_roll = EngineConfig {
            seconds_of_audio_to_write_before: MAX_PRE_ROLL_SECS + 1.0,
            ..Default::default()
        };
        assert!(matches!(pre_roll.validate(), Err(CaptureError::InvalidArguments(_))));

        let longest = EngineConfig {
            ring_buffer_secs: MAX_RING_BUFFER_SECS,
            seconds_of_audio_to_write_before: MAX_PRE_ROLL_SECS,
            ..Default::default()
        };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"silence_threshold_db": -50.0, "processing_mode": "manual"}"#).unwrap();
        assert_eq!(config.silence_threshold_db, -50.0);
        assert_eq!(config.processing_mode, ProcessingMode::Manual);
        assert_eq!(config.silence_duration_secs, 2.0);
    }
}
