use crate::models::audio_models::SilenceState;

use super::sample_codec::{self, FLOOR_DB};

/// Blocks averaged by the energy moving average.
pub const ENERGY_AVERAGE_BLOCKS: usize = 4;

/// Immutable detector configuration, swapped as a whole by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    pub enabled: bool,
    pub threshold_db: f32,
    pub duration_secs: f32,
    /// Seconds of audio kept while silent and written ahead of the next sound.
    pub pre_roll_secs: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_db: -40.0,
            duration_secs: 2.0,
            pre_roll_secs: 0.0,
        }
    }
}

/// Threshold/duration silence detection over per-block energy.
///
/// Silence is entered once the averaged level stays below the threshold for
/// the configured duration; any block at or above the threshold resets the
/// timer. Sound is reported on the first block at or above the threshold.
#[derive(Debug)]
pub struct SilenceDetector {
    history: [f32; ENERGY_AVERAGE_BLOCKS],
    next: usize,
    filled: usize,
    below_secs: f64,
    is_silent: bool,
    decibel: f32,
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SilenceDetector {
    pub fn new() -> Self {
        Self {
            history: [0.0; ENERGY_AVERAGE_BLOCKS],
            next: 0,
            filled: 0,
            below_secs: 0.0,
            is_silent: false,
            decibel: FLOOR_DB,
        }
    }

    /// Fold one block into the moving average and return the averaged level in dB.
    pub fn measure(&mut self, block: &[f32]) -> f32 {
        self.history[self.next] = sample_codec::mean_square(block);
        self.next = (self.next + 1) % ENERGY_AVERAGE_BLOCKS;
        self.filled = (self.filled + 1).min(ENERGY_AVERAGE_BLOCKS);

        let average = self.history[..self.filled].iter().sum::<f32>() / self.filled as f32;
        self.decibel = sample_codec::energy_to_db(average);
        self.decibel
    }

    /// Advance the detector by `block_secs` of audio at level `decibel`.
    ///
    /// Returns the new state on a transition, `None` otherwise.
    pub fn update(&mut self, decibel: f32, block_secs: f64, settings: &DetectorSettings) -> Option<SilenceState> {
        self.decibel = decibel;
        if decibel < settings.threshold_db {
            self.below_secs += block_secs;
            if !self.is_silent && self.below_secs >= settings.duration_secs as f64 {
                self.is_silent = true;
                return Some(self.state());
            }
        } else {
            self.below_secs = 0.0;
            if self.is_silent {
                self.is_silent = false;
                return Some(self.state());
            }
        }
        None
    }

    pub fn state(&self) -> SilenceState {
        SilenceState {
            is_silent: self.is_silent,
            decibel: self.decibel,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.is_silent
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const BLOCK_SECS: f64 = 0.1;

    fn settings() -> DetectorSettings {
        DetectorSettings {
            enabled: true,
            threshold_db: -40.0,
            duration_secs: 1.0,
            pre_roll_secs: 0.0,
        }
    }

    #[test]
    fn starts_not_silent() {
        let detector = SilenceDetector::new();
        assert!(!detector.state().is_silent);
        assert_eq!(detector.state().decibel, FLOOR_DB);
    }

    #[test]
    fn enters_silence_after_duration() {
        let mut detector = SilenceDetector::new();
        let settings = settings();
        for _ in 0..9 {
            assert_eq!(detector.update(-80.0, BLOCK_SECS, &settings), None);
        }
        let edge = detector.update(-80.0, BLOCK_SECS, &settings).unwrap();
        assert!(edge.is_silent);
        assert_eq!(edge.decibel, -80.0);

        // No repeated notifications while silence continues.
        for _ in 0..20 {
            assert_eq!(detector.update(-80.0, BLOCK_SECS, &settings), None);
        }
    }

    #[test]
    fn loud_block_resets_timer() {
        let mut detector = SilenceDetector::new();
        let settings = settings();
        for _ in 0..8 {
            detector.update(-80.0, BLOCK_SECS, &settings);
        }
        assert_eq!(detector.update(-10.0, BLOCK_SECS, &settings), None);
        for _ in 0..9 {
            assert_eq!(detector.update(-80.0, BLOCK_SECS, &settings), None);
        }
        assert!(detector.update(-80.0, BLOCK_SECS, &settings).unwrap().is_silent);
    }

    #[test]
    fn recovers_on_first_loud_block() {
        let mut detector = SilenceDetector::new();
        let settings = settings();
        for _ in 0..10 {
            detector.update(-80.0, BLOCK_SECS, &settings);
        }
        assert!(detector.is_silent());

        let edge = detector.update(-40.0, BLOCK_SECS, &settings).unwrap();
        assert!(!edge.is_silent);
        assert_eq!(detector.update(-20.0, BLOCK_SECS, &settings), None);
    }

    #[test]
    fn measure_averages_last_blocks() {
        let mut detector = SilenceDetector::new();
        let loud = vec![1.0f32; 64];
        let quiet = vec![0.0f32; 64];

        assert_relative_eq!(detector.measure(&loud), 0.0, epsilon = 1e-4);
        // Average of 1, 0 -> 0.5.
        assert_relative_eq!(detector.measure(&quiet), -3.0103, epsilon = 1e-3);
        detector.measure(&quiet);
        detector.measure(&quiet);
        // The loud block has fallen out of the window.
        assert!(detector.measure(&quiet) <= -99.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut detector = SilenceDetector::new();
        let settings = settings();
        for _ in 0..10 {
            detector.update(-80.0, BLOCK_SECS, &settings);
        }
        detector.reset();
        assert!(!detector.is_silent());
    }
}
