use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Device id that resolves to the platform default input.
pub const DEFAULT_DEVICE_ID: i32 = -1;

/// Highest channel count a session may request.
pub const MAX_CHANNELS: u16 = 254;

/// Highest sample rate a session may request, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// An input device available for capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDevice {
    pub id: i32,
    pub name: String,
    pub is_default: bool,
    pub channels: u16,
}

/// Sample encoding of a capture session. All encodings are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S24,
    S32,
    F32,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S24 => 3,
            Self::S32 | Self::F32 => 4,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bytes_per_sample() as u16 * 8
    }

    /// WAV `fmt ` chunk format tag: 1 = integer PCM, 3 = IEEE float.
    pub fn wav_format_tag(&self) -> u16 {
        match self {
            Self::F32 => 3,
            _ => 1,
        }
    }

    /// Numeric code used by the binding layer.
    pub fn code(&self) -> i32 {
        match self {
            Self::U8 => 0,
            Self::S16 => 1,
            Self::S24 => 2,
            Self::S32 => 3,
            Self::F32 => 4,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, CaptureError> {
        match code {
            0 => Ok(Self::U8),
            1 => Ok(Self::S16),
            2 => Ok(Self::S24),
            3 => Ok(Self::S32),
            4 => Ok(Self::F32),
            other => Err(CaptureError::InvalidArguments(format!("unknown sample format code: {}", other))),
        }
    }
}

/// Format of an open capture session. Fixed until deinit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_format: SampleFormat, sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_format,
            sample_rate,
            channels,
        }
    }

    /// Rejects rates outside `1..=MAX_SAMPLE_RATE` and channel counts outside
    /// `1..=MAX_CHANNELS`, which keeps WAV header fields within range.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !(1..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(CaptureError::InvalidArguments(format!(
                "sample rate must be within 1..={} Hz: {}",
                MAX_SAMPLE_RATE, self.sample_rate
            )));
        }
        if !(1..=MAX_CHANNELS).contains(&self.channels) {
            return Err(CaptureError::InvalidArguments(format!(
                "channel count must be within 1..={}: {}",
                MAX_CHANNELS, self.channels
            )));
        }
        Ok(())
    }

    /// Bytes per interleaved frame (one sample per channel).
    pub fn block_align(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channels as usize
    }

    pub fn is_float(&self) -> bool {
        self.sample_format == SampleFormat::F32
    }

    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate as f64
    }
}

/// Silence detector output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceState {
    pub is_silent: bool,
    pub decibel: f32,
}

/// Counters for debugging capture sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineDiagnostics {
    /// Frames handed to the ring buffer by the device callback.
    pub frames_captured: u64,
    /// Frames that went through the processing step.
    pub frames_processed: u64,
    /// Frames overwritten before the processing step could read them.
    pub frames_lost: u64,
    /// Times `init` tore down a live session.
    pub implicit_teardowns: u64,
    pub stream_blocks_delivered: u64,
    pub recording_write_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_format_sizes() {
        assert_eq!(SampleFormat::U8.bits_per_sample(), 8);
        assert_eq!(SampleFormat::S24.bytes_per_sample(), 3);
        assert_eq!(SampleFormat::F32.wav_format_tag(), 3);
        assert_eq!(SampleFormat::S32.wav_format_tag(), 1);
    }

    #[test]
    fn sample_format_codes_roundtrip() {
        for format in [SampleFormat::U8, SampleFormat::S16, SampleFormat::S24, SampleFormat::S32, SampleFormat::F32] {
            assert_eq!(SampleFormat::from_code(format.code()).unwrap(), format);
        }
        assert!(SampleFormat::from_code(9).is_err());
    }

    #[test]
    fn audio_format_validation() {
        assert!(AudioFormat::new(SampleFormat::F32, 22050, 1).validate().is_ok());
        assert!(AudioFormat::new(SampleFormat::F32, 0, 1).validate().is_err());
        assert!(AudioFormat::new(SampleFormat::S16, 44100, 0).validate().is_err());
    }

    #[test]
    fn audio_format_upper_bounds() {
        assert!(AudioFormat::new(SampleFormat::F32, MAX_SAMPLE_RATE, MAX_CHANNELS).validate().is_ok());
        assert!(matches!(
            AudioFormat::new(SampleFormat::F32, MAX_SAMPLE_RATE + 1, 2).validate(),
            Err(CaptureError::InvalidArguments(_))
        ));
        assert!(matches!(
            AudioFormat::new(SampleFormat::F32, 48000, MAX_CHANNELS + 1).validate(),
            Err(CaptureError::InvalidArguments(_))
        ));
        assert!(AudioFormat::new(SampleFormat::F32, 48000, 20000).validate().is_err());
    }

    #[test]
    fn block_align_counts_all_channels() {
        assert_eq!(AudioFormat::new(SampleFormat::S16, 48000, 2).block_align(), 4);
        assert_eq!(AudioFormat::new(SampleFormat::S24, 48000, 2).block_align(), 6);
    }

    #[test]
    fn device_record_serializes_camel_case() {
        let device = CaptureDevice {
            id: 0,
            name: "Built-in Microphone".into(),
            is_default: true,
            channels: 1,
        };
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"isDefault\":true"));
    }
}
