//! WAV file format utilities.
//!
//! Generates canonical 44-byte RIFF WAV headers and provides helpers for
//! patching the length fields while a recording is still growing.

use crate::models::audio_models::AudioFormat;

/// Size of the canonical WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Byte offset of the RIFF chunk size field.
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Byte offset of the data chunk size field.
pub const DATA_SIZE_OFFSET: u64 = 40;

/// Generate a 44-byte WAV RIFF header.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (fmt chunk size)
/// [20-21]  format tag (1 = PCM, 3 = IEEE float)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * block_align
/// [32-33]  block_align = channels * bytes_per_sample
/// [34-35]  bits_per_sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &AudioFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let block_align = format.block_align() as u16;
    let byte_rate = format.sample_rate * block_align as u32;

    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_size(data_size as u64).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&format.sample_format.wav_format_tag().to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&format.sample_format.bits_per_sample().to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// RIFF chunk size for a given data length, saturated to the 32-bit field.
pub fn riff_size(data_size: u64) -> u32 {
    (data_size + WAV_HEADER_SIZE as u64 - 8).min(u32::MAX as u64) as u32
}

/// Data chunk size, saturated to the 32-bit field.
pub fn data_size_field(data_size: u64) -> u32 {
    data_size.min(u32::MAX as u64) as u32
}

/// Length fields read back from a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeaderInfo {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub riff_size: u32,
    pub data_size: u32,
}

/// Parse a canonical header. Returns `None` if the magic numbers don't match.
pub fn parse_wav_header(header: &[u8]) -> Option<WavHeaderInfo> {
    if header.len() < WAV_HEADER_SIZE || &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return None;
    }
    if &header[12..16] != b"fmt " || &header[36..40] != b"data" {
        return None;
    }
    let u16_at = |i: usize| u16::from_le_bytes([header[i], header[i + 1]]);
    let u32_at = |i: usize| u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]]);
    Some(WavHeaderInfo {
        format_tag: u16_at(20),
        channels: u16_at(22),
        sample_rate: u32_at(24),
        block_align: u16_at(32),
        bits_per_sample: u16_at(34),
        riff_size: u32_at(4),
        data_size: u32_at(40),
    })
}
