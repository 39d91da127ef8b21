use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::ring_buffer::RingBuffer;
use super::sample_codec;

/// Samples per analysis output (FFT bins and waveform points).
pub const ANALYSIS_SIZE: usize = 256;

/// FFT length: the analysis window zero-padded to twice its size.
const FFT_SIZE: usize = ANALYSIS_SIZE * 2;

/// Width of one texture row: FFT bins followed by waveform points.
pub const TEXTURE_WIDTH: usize = ANALYSIS_SIZE * 2;

/// Rows kept by the 2D texture history.
pub const TEXTURE_ROWS: usize = 256;

/// The most recent mono window of the filtered stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisWindow {
    pub samples: [f32; ANALYSIS_SIZE],
    /// Ring write sequence at capture time; identifies "new data".
    pub seq: u64,
}

impl AnalysisWindow {
    /// Snapshot the latest [`ANALYSIS_SIZE`] frames of `ring`, downmixed to mono.
    pub fn capture(ring: &RingBuffer) -> Self {
        let channels = ring.channels();
        let mut interleaved = vec![0.0f32; ANALYSIS_SIZE * channels];
        let seq = ring.write_seq();
        ring.latest(&mut interleaved);

        let mut samples = [0.0f32; ANALYSIS_SIZE];
        sample_codec::downmix_to_mono(&interleaved, channels, &mut samples);
        Self { samples, seq }
    }

    /// Mean-square loudness of the window in dB.
    pub fn volume_db(&self) -> f32 {
        sample_codec::energy_to_db(sample_codec::mean_square(&self.samples))
    }
}

/// Windowed FFT magnitude and waveform snapshots with temporal smoothing.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothing: f32,
    always_return_data: bool,
    bins: [f32; ANALYSIS_SIZE],
    wave: [f32; ANALYSIS_SIZE],
    last_fft_seq: Option<u64>,
    last_wave_seq: Option<u64>,
    texture_2d: Vec<f32>,
}

impl SpectralAnalyzer {
    pub fn new(smoothing: f32, always_return_data: bool) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        let hann = (0..ANALYSIS_SIZE)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / ANALYSIS_SIZE as f32).cos())
            .collect();
        Self {
            fft,
            hann,
            buffer: vec![Complex::default(); FFT_SIZE],
            scratch,
            smoothing: smoothing.clamp(0.0, 1.0),
            always_return_data,
            bins: [0.0; ANALYSIS_SIZE],
            wave: [0.0; ANALYSIS_SIZE],
            last_fft_seq: None,
            last_wave_seq: None,
            texture_2d: vec![0.0; TEXTURE_ROWS * TEXTURE_WIDTH],
        }
    }

    /// Temporal smoothing in [0, 1]; out-of-range values are clamped.
    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = if smoothing.is_nan() { 0.0 } else { smoothing.clamp(0.0, 1.0) };
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn set_always_return_data(&mut self, value: bool) {
        self.always_return_data = value;
    }

    /// Forget previous snapshots and texture history.
    pub fn reset(&mut self) {
        self.bins = [0.0; ANALYSIS_SIZE];
        self.wave = [0.0; ANALYSIS_SIZE];
        self.last_fft_seq = None;
        self.last_wave_seq = None;
        self.texture_2d.fill(0.0);
    }

    /// Smoothed FFT magnitudes of `window`.
    ///
    /// Rising bins update instantly; falling bins decay as
    /// `smoothing * previous + (1 - smoothing) * current`.
    pub fn fft(&mut self, window: &AnalysisWindow) -> [f32; ANALYSIS_SIZE] {
        if self.last_fft_seq == Some(window.seq) {
            return if self.always_return_data { self.bins } else { [0.0; ANALYSIS_SIZE] };
        }
        self.last_fft_seq = Some(window.seq);

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let re = if i < ANALYSIS_SIZE { window.samples[i] * self.hann[i] } else { 0.0 };
            *slot = Complex::new(re, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // A full-scale sine centred on a bin peaks at sum(hann) / 2.
        let scale = 2.0 / (ANALYSIS_SIZE as f32 * 0.5);
        let smooth = self.smoothing;
        for (bin, value) in self.bins.iter_mut().zip(&self.buffer[..ANALYSIS_SIZE]) {
            let current = value.norm() * scale;
            *bin = if current >= *bin {
                current
            } else {
                smooth * *bin + (1.0 - smooth) * current
            };
        }
        self.bins
    }

    /// Waveform of `window`.
    pub fn wave(&mut self, window: &AnalysisWindow) -> [f32; ANALYSIS_SIZE] {
        if self.last_wave_seq == Some(window.seq) {
            return if self.always_return_data { self.wave } else { [0.0; ANALYSIS_SIZE] };
        }
        self.last_wave_seq = Some(window.seq);
        self.wave = window.samples;
        self.wave
    }

    /// FFT followed by waveform in one buffer of [`TEXTURE_WIDTH`] values.
    pub fn texture(&mut self, window: &AnalysisWindow) -> Vec<f32> {
        let mut row = Vec::with_capacity(TEXTURE_WIDTH);
        row.extend_from_slice(&self.fft(window));
        row.extend_from_slice(&self.wave(window));
        row
    }

    /// History of textures, newest in row 0, [`TEXTURE_ROWS`] x [`TEXTURE_WIDTH`] row-major.
    pub fn texture_2d(&mut self, window: &AnalysisWindow) -> Vec<f32> {
        let row = self.texture(window);
        self.texture_2d.copy_within(..(TEXTURE_ROWS - 1) * TEXTURE_WIDTH, TEXTURE_WIDTH);
        self.texture_2d[..TEXTURE_WIDTH].copy_from_slice(&row);
        self.texture_2d.clone()
    }

    /// One cell of the 2D texture history; 0.0 outside the matrix.
    pub fn texture_value(&self, row: usize, column: usize) -> f32 {
        if row >= TEXTURE_ROWS || column >= TEXTURE_WIDTH {
            return 0.0;
        }
        self.texture_2d[row * TEXTURE_WIDTH + column]
    }
}
