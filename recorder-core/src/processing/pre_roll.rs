/// Bounded buffer of the most recent audio, used to keep the tail of a
/// silent stretch so a recording can resume with the lead-in of the next sound.
///
/// Overflow behavior: drops oldest samples. Capacity is rounded down to whole
/// frames so a drained buffer always starts on a frame boundary.
#[derive(Debug)]
pub struct PreRollBuffer {
    buffer: Vec<f32>,
    write_index: usize,
    read_index: usize,
    available: usize,
    capacity: usize,
}

impl PreRollBuffer {
    pub fn new(capacity: usize, channels: u16) -> Self {
        let channels = channels.max(1) as usize;
        let capacity = capacity - capacity % channels;
        Self {
            buffer: vec![0.0; capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
            capacity,
        }
    }

    /// Buffer sized for `seconds` of audio at the given rate and channel count.
    pub fn for_duration(seconds: f32, sample_rate: u32, channels: u16) -> Self {
        let samples = (seconds.max(0.0) as f64 * sample_rate as f64 * channels as f64) as usize;
        Self::new(samples, channels)
    }

    /// Write samples into the buffer.
    ///
    /// If the buffer overflows, the oldest samples are dropped.
    /// If `samples` is larger than capacity, only the last `capacity` samples are kept.
    pub fn push(&mut self, samples: &[f32]) {
        if samples.is_empty() || self.capacity == 0 {
            return;
        }

        let samples = if samples.len() > self.capacity {
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        let overflow = (self.available + samples.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % self.capacity;
            self.available -= overflow;
        }

        let first = samples.len().min(self.capacity - self.write_index);
        self.buffer[self.write_index..self.write_index + first].copy_from_slice(&samples[..first]);
        self.buffer[..samples.len() - first].copy_from_slice(&samples[first..]);
        self.write_index = (self.write_index + samples.len()) % self.capacity;
        self.available += samples.len();
    }

    /// Move every buffered sample, oldest first, to the end of `out`.
    pub fn drain_into(&mut self, out: &mut Vec<f32>) {
        if self.available == 0 {
            return;
        }
        let first = self.available.min(self.capacity - self.read_index);
        out.extend_from_slice(&self.buffer[self.read_index..self.read_index + first]);
        out.extend_from_slice(&self.buffer[..self.available - first]);
        self.clear();
    }

    /// Number of samples currently buffered.
    pub fn len(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    pub fn clear(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
