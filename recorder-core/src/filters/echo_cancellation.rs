use crate::models::error::CaptureError;
use crate::traits::filter::{AudioFilter, ParamInfo};

use super::FilterKind;

const DELAY_MS: usize = 0;
const ATTENUATION: usize = 1;

pub(crate) const PARAMS: &[ParamInfo] = &[
    ParamInfo { name: "Echo Delay (ms)", default: 50.0, min: 0.0, max: 1000.0 },
    ParamInfo { name: "Echo Attenuation", default: 0.7, min: 0.0, max: 1.0 },
];

/// Subtracts an attenuated, delayed copy of the input from itself.
///
/// The delay line holds raw input samples, interleaved like the stream.
#[derive(Debug)]
pub struct EchoCancellation {
    sample_rate: u32,
    values: [f32; 2],
    line: Vec<f32>,
    channels: usize,
    position: usize,
}

impl EchoCancellation {
    pub fn new(sample_rate: u32) -> Self {
        let mut filter = Self {
            sample_rate,
            values: [PARAMS[DELAY_MS].default, PARAMS[ATTENUATION].default],
            line: Vec::new(),
            channels: 1,
            position: 0,
        };
        filter.resize_line(1);
        filter
    }

    fn delay_frames(&self) -> usize {
        (self.values[DELAY_MS] / 1000.0 * self.sample_rate as f32) as usize
    }

    fn resize_line(&mut self, channels: usize) {
        self.channels = channels;
        self.line = vec![0.0; self.delay_frames() * channels];
        self.position = 0;
    }
}

impl AudioFilter for EchoCancellation {
    fn kind(&self) -> FilterKind {
        FilterKind::EchoCancellation
    }

    fn params(&self) -> &'static [ParamInfo] {
        PARAMS
    }

    fn get_param(&self, id: usize) -> Result<f32, CaptureError> {
        self.values.get(id).copied().ok_or(CaptureError::FilterParameterGetError(id))
    }

    /// Values outside the parameter range are rejected.
    fn set_param(&mut self, id: usize, value: f32) -> Result<(), CaptureError> {
        let info = PARAMS
            .get(id)
            .ok_or_else(|| CaptureError::InvalidArguments(format!("echo cancellation has no parameter {}", id)))?;
        if !info.contains(value) {
            return Err(CaptureError::InvalidArguments(format!(
                "{} out of range [{}, {}]: {}",
                info.name, info.min, info.max, value
            )));
        }
        self.values[id] = value;
        if id == DELAY_MS {
            let channels = self.channels;
            self.resize_line(channels);
        }
        Ok(())
    }

    fn apply(&mut self, samples: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        if channels != self.channels {
            self.resize_line(channels);
        }
        if self.line.is_empty() {
            return;
        }
        let attenuation = self.values[ATTENUATION];
        for sample in samples.iter_mut() {
            let input = *sample;
            *sample = input - attenuation * self.line[self.position];
            self.line[self.position] = input;
            self.position = (self.position + 1) % self.line.len();
        }
    }

    fn reset(&mut self) {
        self.line.fill(0.0);
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn defaults() {
        let echo = EchoCancellation::new(1000);
        assert_eq!(echo.get_param(DELAY_MS).unwrap(), 50.0);
        assert_eq!(echo.get_param(ATTENUATION).unwrap(), 0.7);
        assert_eq!(echo.params()[0].name, "Echo Delay (ms)");
    }

    #[test]
    fn subtracts_delayed_input() {
        // 10 ms at 1 kHz = 10 frames of delay.
        let mut echo = EchoCancellation::new(1000);
        echo.set_param(DELAY_MS, 10.0).unwrap();
        echo.set_param(ATTENUATION, 0.5).unwrap();

        let mut samples: Vec<f32> = (0..20).map(|i| i as f32 / 20.0).collect();
        let input = samples.clone();
        echo.apply(&mut samples, 1);

        for i in 0..10 {
            assert_relative_eq!(samples[i], input[i]);
        }
        for i in 10..20 {
            assert_relative_eq!(samples[i], input[i] - 0.5 * input[i - 10]);
        }
    }

    #[test]
    fn delay_line_spans_blocks() {
        let mut echo = EchoCancellation::new(1000);
        echo.set_param(DELAY_MS, 4.0).unwrap();
        echo.set_param(ATTENUATION, 1.0).unwrap();

        let mut first = vec![1.0f32, 0.0, 0.0];
        echo.apply(&mut first, 1);
        let mut second = vec![0.0f32, 0.0, 0.0];
        echo.apply(&mut second, 1);
        assert_eq!(second, vec![0.0, -1.0, 0.0]);
    }

    #[test]
    fn rejects_out_of_range() {
        let mut echo = EchoCancellation::new(48000);
        assert!(matches!(echo.set_param(ATTENUATION, 1.5), Err(CaptureError::InvalidArguments(_))));
        assert!(matches!(echo.set_param(DELAY_MS, -1.0), Err(CaptureError::InvalidArguments(_))));
        assert_eq!(echo.get_param(ATTENUATION).unwrap(), 0.7);
        assert!(matches!(echo.set_param(2, 0.0), Err(CaptureError::InvalidArguments(_))));
        assert_eq!(echo.get_param(2), Err(CaptureError::FilterParameterGetError(2)));
    }

    #[test]
    fn zero_delay_passes_through() {
        let mut echo = EchoCancellation::new(48000);
        echo.set_param(DELAY_MS, 0.0).unwrap();
        let mut samples = vec![0.3f32, -0.2];
        echo.apply(&mut samples, 2);
        assert_eq!(samples, vec![0.3, -0.2]);
    }
}
