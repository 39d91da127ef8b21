//! Pure-math sample conversion and level helpers.
//!
//! Internally every stage works on interleaved `f32` in `[-1.0, 1.0]`.
//! Device callbacks decode into that range; the recorder and the stream feed
//! encode back into the session's [`SampleFormat`].

use crate::models::audio_models::SampleFormat;

/// Lowest level reported by any decibel measurement.
pub const FLOOR_DB: f32 = -100.0;

const I24_MAX: f32 = 8_388_607.0;

pub fn u8_to_f32(sample: u8) -> f32 {
    (sample as f32 - 128.0) / 128.0
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

pub fn i32_to_f32(sample: i32) -> f32 {
    (sample as f64 / 2_147_483_648.0) as f32
}

/// Append `samples` to `out` encoded as little-endian `format`.
///
/// Integer encodings clamp out-of-range values; `F32` is written as-is.
pub fn encode_into(samples: &[f32], format: SampleFormat, out: &mut Vec<u8>) {
    out.reserve(samples.len() * format.bytes_per_sample());
    match format {
        SampleFormat::U8 => {
            out.extend(samples.iter().map(|&s| (s * 128.0 + 128.0).clamp(0.0, 255.0) as u8));
        }
        SampleFormat::S16 => {
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        SampleFormat::S24 => {
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) * I24_MAX) as i32;
                out.extend_from_slice(&value.to_le_bytes()[..3]);
            }
        }
        SampleFormat::S32 => {
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32;
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        SampleFormat::F32 => {
            for &sample in samples {
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
    }
}

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize, out: &mut [f32]) {
    if channels <= 1 {
        let n = samples.len().min(out.len());
        out[..n].copy_from_slice(&samples[..n]);
        return;
    }
    let scale = 1.0 / channels as f32;
    for (frame, value) in samples.chunks_exact(channels).zip(out.iter_mut()) {
        *value = frame.iter().sum::<f32>() * scale;
    }
}

/// Mean of squared samples.
pub fn mean_square(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum / samples.len() as f64) as f32
}

/// Compute RMS level of samples (0.0–1.0 range for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    mean_square(samples).sqrt()
}

/// Energy (mean square) to decibels, never below [`FLOOR_DB`].
pub fn energy_to_db(energy: f32) -> f32 {
    (10.0 * (energy + 1e-10).log10()).max(FLOOR_DB)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn encode(samples: &[f32], format: SampleFormat) -> Vec<u8> {
        let mut out = Vec::new();
        encode_into(samples, format, &mut out);
        out
    }

    #[test]
    fn encode_s16() {
        let pcm = encode(&[0.0, 1.0, -1.0, 0.5], SampleFormat::S16);
        assert_eq!(pcm.len(), 8);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -i16::MAX);
    }

    #[test]
    fn encode_clamps_out_of_range() {
        let pcm = encode(&[2.0, -3.0], SampleFormat::S16);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), -i16::MAX);
    }

    #[test]
    fn encode_s24_packs_three_bytes() {
        let pcm = encode(&[1.0, -1.0], SampleFormat::S24);
        assert_eq!(pcm.len(), 6);
        assert_eq!(&pcm[0..3], &[0xFF, 0xFF, 0x7F]);
        assert_eq!(&pcm[3..6], &[0x01, 0x00, 0x80]);
    }

    #[test]
    fn encode_u8_is_offset_binary() {
        let pcm = encode(&[0.0, -1.0, 1.0], SampleFormat::U8);
        assert_eq!(pcm, vec![128, 0, 255]);
    }

    #[test]
    fn encode_f32_is_lossless() {
        let pcm = encode(&[0.25, 1.5], SampleFormat::F32);
        assert_eq!(f32::from_le_bytes([pcm[4], pcm[5], pcm[6], pcm[7]]), 1.5);
    }

    #[test]
    fn decode_integer_formats() {
        assert_eq!(u8_to_f32(128), 0.0);
        assert_eq!(i16_to_f32(-32768), -1.0);
        assert_relative_eq!(i32_to_f32(i32::MIN), -1.0);
    }

    #[test]
    fn downmix_stereo_to_mono() {
        let mut mono = [0.0f32; 2];
        downmix_to_mono(&[0.2, 0.8, 0.4, 0.6], 2, &mut mono);
        assert_relative_eq!(mono[0], 0.5);
        assert_relative_eq!(mono[1], 0.5);
    }

    #[test]
    fn levels() {
        assert_eq!(rms_level(&[0.0, 0.0]), 0.0);
        assert_relative_eq!(rms_level(&[1.0, -1.0, 1.0]), 1.0);
    }

    #[test]
    fn decibels_have_a_floor() {
        assert_relative_eq!(energy_to_db(0.0), FLOOR_DB, epsilon = 1e-3);
        assert!(energy_to_db(0.0) >= FLOOR_DB);
        assert_relative_eq!(energy_to_db(1.0), 0.0, epsilon = 1e-4);
        assert_relative_eq!(energy_to_db(0.5), -3.0103, epsilon = 1e-3);
    }
}
