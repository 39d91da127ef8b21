use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};

/// Fixed-capacity single-writer / multi-reader ring of interleaved `f32` samples.
///
/// The writer never blocks and never allocates: it stores samples into slots
/// and publishes them by advancing a monotonically increasing write sequence.
/// Each reader keeps its own [`RingReader`] position. A reader that falls more
/// than one capacity behind is "lapped": the overwritten samples are skipped
/// and reported as a gap in [`ReadOutcome::lost`], never as an error.
///
/// Slots hold `f32` bit patterns in `AtomicU32`s, so a concurrent overwrite can
/// only ever produce a stale sample, which the claim counter then detects:
///
/// ```text
/// writer: claim = seq + n ; fence(Release) ; store slots ; write_seq = seq + n (Release)
/// reader: end = write_seq (Acquire) ; load slots ; fence(Acquire) ; claim -> drop slots < claim - capacity
/// ```
#[derive(Debug)]
pub struct RingBuffer {
    slots: Box<[AtomicU32]>,
    channels: usize,
    write_seq: AtomicU64,
    claim_seq: AtomicU64,
}

/// Per-reader cursor into a [`RingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingReader {
    next: u64,
}

impl RingReader {
    /// Sequence number of the next sample this reader will see.
    pub fn position(&self) -> u64 {
        self.next
    }
}

/// Result of a [`RingBuffer::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOutcome {
    /// Samples appended to the output.
    pub copied: usize,
    /// Samples that were overwritten before this reader got to them.
    pub lost: u64,
}

impl RingBuffer {
    /// Create a ring holding `capacity_frames` interleaved frames of `channels` samples.
    pub fn new(capacity_frames: usize, channels: u16) -> Self {
        let channels = channels.max(1) as usize;
        let capacity = capacity_frames.max(1) * channels;
        let slots = (0..capacity).map(|_| AtomicU32::new(0)).collect::<Vec<_>>().into_boxed_slice();
        Self {
            slots,
            channels,
            write_seq: AtomicU64::new(0),
            claim_seq: AtomicU64::new(0),
        }
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Total samples ever published.
    pub fn write_seq(&self) -> u64 {
        self.write_seq.load(Ordering::Acquire)
    }

    /// A reader positioned at the current end of the stream.
    pub fn reader(&self) -> RingReader {
        RingReader { next: self.write_seq() }
    }

    /// Publish samples. Must only be called from the single writer.
    ///
    /// Only whole frames are written; a block larger than the ring keeps its
    /// tail. Returns the number of samples published.
    pub(crate) fn write<I>(&self, samples: I) -> usize
    where
        I: ExactSizeIterator<Item = f32>,
    {
        let total = samples.len();
        let whole = total - total % self.channels;
        if whole == 0 {
            return 0;
        }
        let capacity = self.capacity();
        let skip = whole.saturating_sub(capacity);
        let count = whole - skip;

        let seq = self.write_seq.load(Ordering::Relaxed);
        let end = seq + count as u64;
        self.claim_seq.store(end, Ordering::Relaxed);
        fence(Ordering::Release);

        for (i, sample) in samples.skip(skip).take(count).enumerate() {
            let slot = ((seq + i as u64) % capacity as u64) as usize;
            self.slots[slot].store(sample.to_bits(), Ordering::Relaxed);
        }

        self.write_seq.store(end, Ordering::Release);
        count
    }

    /// Append up to `max` unread samples (rounded down to whole frames) to `out`.
    pub fn read(&self, reader: &mut RingReader, out: &mut Vec<f32>, max: usize) -> ReadOutcome {
        let end = self.write_seq.load(Ordering::Acquire);
        let capacity = self.capacity() as u64;
        let mut outcome = ReadOutcome::default();

        let oldest = end.saturating_sub(capacity);
        if reader.next < oldest {
            outcome.lost = oldest - reader.next;
            reader.next = oldest;
        }

        let max = (max - max % self.channels) as u64;
        let start = reader.next;
        let stop = end.min(start + max);
        if stop <= start {
            return outcome;
        }

        let base = out.len();
        out.extend((start..stop).map(|seq| f32::from_bits(self.slots[(seq % capacity) as usize].load(Ordering::Relaxed))));

        fence(Ordering::Acquire);
        let claimed = self.claim_seq.load(Ordering::Relaxed);
        let valid_from = claimed.saturating_sub(capacity).max(start);
        if valid_from > start {
            // The writer overtook us while copying.
            let torn = (valid_from.min(stop) - start) as usize;
            out.drain(base..base + torn);
            outcome.lost += torn as u64;
        }

        outcome.copied = out.len() - base;
        reader.next = stop;
        outcome
    }

    /// Copy the most recent samples into `out`, oldest first.
    ///
    /// Fills `out` from the end when fewer samples exist; the leading part is
    /// zeroed. Returns the number of valid samples.
    pub fn latest(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        let wanted = (out.len() - out.len() % self.channels).min(self.capacity());
        let end = self.write_seq.load(Ordering::Acquire);
        let start = end.saturating_sub(wanted as u64);
        let available = (end - start) as usize;
        if available == 0 {
            return 0;
        }

        let capacity = self.capacity() as u64;
        let offset = out.len() - available;
        for (i, seq) in (start..end).enumerate() {
            out[offset + i] = f32::from_bits(self.slots[(seq % capacity) as usize].load(Ordering::Relaxed));
        }

        fence(Ordering::Acquire);
        let claimed = self.claim_seq.load(Ordering::Relaxed);
        let valid_from = claimed.saturating_sub(capacity);
        if valid_from > start {
            let torn = ((valid_from - start) as usize).min(available);
            out[offset..offset + torn].fill(0.0);
            return available - torn;
        }
        available
    }
}
