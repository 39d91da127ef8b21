use crate::models::error::CaptureError;
use crate::processing::sample_codec;
use crate::traits::filter::{AudioFilter, ParamInfo};

use super::FilterKind;

const TARGET_RMS: usize = 0;
const ATTACK_TIME: usize = 1;
const RELEASE_TIME: usize = 2;
const GAIN_SMOOTHING: usize = 3;
const MAX_GAIN: usize = 4;
const MIN_GAIN: usize = 5;

/// Window of the exponential RMS follower.
const RMS_WINDOW_SECS: f32 = 0.5;

pub(crate) const PARAMS: &[ParamInfo] = &[
    ParamInfo { name: "Target RMS", default: 0.1, min: 0.01, max: 1.0 },
    ParamInfo { name: "Attack Time", default: 0.1, min: 0.01, max: 0.5 },
    ParamInfo { name: "Release Time", default: 0.2, min: 0.01, max: 0.5 },
    ParamInfo { name: "Gain Smoothing", default: 0.05, min: 0.001, max: 1.0 },
    ParamInfo { name: "Max Gain", default: 6.0, min: 1.0, max: 6.0 },
    ParamInfo { name: "Min Gain", default: 0.2, min: 0.1, max: 1.0 },
];

/// Automatic gain control steering the block RMS towards a target level.
#[derive(Debug)]
pub struct AutoGain {
    sample_rate: u32,
    values: [f32; 6],
    smoothed_rms: f32,
    current_gain: f32,
}

impl AutoGain {
    pub fn new(sample_rate: u32) -> Self {
        let mut values = [0.0; 6];
        for (value, info) in values.iter_mut().zip(PARAMS) {
            *value = info.default;
        }
        Self {
            sample_rate: sample_rate.max(1),
            values,
            smoothed_rms: values[TARGET_RMS],
            current_gain: 1.0,
        }
    }

    pub fn current_gain(&self) -> f32 {
        self.current_gain
    }

    fn rms_smoothing_factor(&self, frames: usize) -> f32 {
        let block_secs = frames as f32 / self.sample_rate as f32;
        1.0 - (-block_secs / RMS_WINDOW_SECS).exp()
    }
}

impl AudioFilter for AutoGain {
    fn kind(&self) -> FilterKind {
        FilterKind::AutoGain
    }

    fn params(&self) -> &'static [ParamInfo] {
        PARAMS
    }

    fn get_param(&self, id: usize) -> Result<f32, CaptureError> {
        self.values.get(id).copied().ok_or(CaptureError::FilterParameterGetError(id))
    }

    /// Values outside the parameter range are clamped.
    fn set_param(&mut self, id: usize, value: f32) -> Result<(), CaptureError> {
        let info = PARAMS
            .get(id)
            .ok_or_else(|| CaptureError::InvalidArguments(format!("auto gain has no parameter {}", id)))?;
        if value.is_nan() {
            return Err(CaptureError::InvalidArguments(format!("{} must be a number", info.name)));
        }
        self.values[id] = value.clamp(info.min, info.max);
        Ok(())
    }

    fn apply(&mut self, samples: &mut [f32], channels: usize) {
        if samples.is_empty() {
            return;
        }
        let frames = samples.len() / channels.max(1);
        let rms = sample_codec::rms_level(samples);
        self.smoothed_rms += (rms - self.smoothed_rms) * self.rms_smoothing_factor(frames);

        let target = (self.values[TARGET_RMS] / (self.smoothed_rms + 1e-6))
            .clamp(self.values[MIN_GAIN], self.values[MAX_GAIN].max(self.values[MIN_GAIN]));

        let smoothing = if target > self.current_gain {
            self.values[ATTACK_TIME]
        } else {
            self.values[RELEASE_TIME]
        };
        let gain_smoothing = self.values[GAIN_SMOOTHING];
        self.current_gain += (target - self.current_gain) * (1.0 - (-smoothing * gain_smoothing).exp());
        self.current_gain += (target - self.current_gain) * gain_smoothing;

        let gain = self.current_gain;
        for sample in samples.iter_mut() {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
    }

    fn reset(&mut self) {
        self.smoothed_rms = self.values[TARGET_RMS];
        self.current_gain = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(amplitude: f32) -> Vec<f32> {
        (0..1024).map(|i| if i % 2 == 0 { amplitude } else { -amplitude }).collect()
    }

    #[test]
    fn defaults() {
        let agc = AutoGain::new(48000);
        assert_eq!(agc.get_param(TARGET_RMS).unwrap(), 0.1);
        assert_eq!(agc.get_param(MAX_GAIN).unwrap(), 6.0);
        assert_eq!(agc.params().len(), 6);
        assert_eq!(agc.params()[3].name, "Gain Smoothing");
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut agc = AutoGain::new(48000);
        agc.set_param(MAX_GAIN, 100.0).unwrap();
        assert_eq!(agc.get_param(MAX_GAIN).unwrap(), 6.0);
        agc.set_param(TARGET_RMS, 0.0).unwrap();
        assert_eq!(agc.get_param(TARGET_RMS).unwrap(), 0.01);
    }

    #[test]
    fn invalid_ids() {
        let mut agc = AutoGain::new(48000);
        assert_eq!(agc.get_param(6), Err(CaptureError::FilterParameterGetError(6)));
        assert!(matches!(agc.set_param(6, 1.0), Err(CaptureError::InvalidArguments(_))));
    }

    #[test]
    fn quiet_input_is_boosted() {
        let mut agc = AutoGain::new(16000);
        let mut last = Vec::new();
        for _ in 0..200 {
            last = block(0.01);
            agc.apply(&mut last, 1);
        }
        assert!(agc.current_gain() > 1.0);
        assert!(agc.current_gain() <= 6.0 + 1e-4);
        assert!(last[0] > 0.01);
    }

    #[test]
    fn loud_input_is_attenuated() {
        let mut agc = AutoGain::new(16000);
        for _ in 0..200 {
            let mut samples = block(0.9);
            agc.apply(&mut samples, 1);
        }
        assert!(agc.current_gain() < 1.0);
        assert!(agc.current_gain() >= 0.2 - 1e-4);
    }

    #[test]
    fn output_stays_in_range() {
        let mut agc = AutoGain::new(16000);
        for _ in 0..50 {
            let mut samples = block(0.001);
            agc.apply(&mut samples, 1);
        }
        let mut spike = block(1.0);
        agc.apply(&mut spike, 1);
        assert!(spike.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn reset_restores_unity_gain() {
        let mut agc = AutoGain::new(16000);
        let mut samples = block(0.01);
        agc.apply(&mut samples, 1);
        agc.reset();
        assert_eq!(agc.current_gain(), 1.0);
    }
}
