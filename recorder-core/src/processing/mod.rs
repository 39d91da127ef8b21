pub mod pre_roll;
pub mod ring_buffer;
pub mod sample_codec;
pub mod silence;
pub mod spectrum;
pub mod wav_format;
