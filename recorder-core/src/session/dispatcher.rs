use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::models::audio_models::SilenceState;

/// Called on every silence edge from the processing step.
pub type SilenceCallback = Arc<dyn Fn(SilenceState) + Send + Sync + 'static>;

/// Called with each encoded stream block.
///
/// The slice is only valid for the duration of the call; copy it to keep it.
pub type StreamCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Blocks a stream subscriber may fall behind before new blocks are dropped for it.
const STREAM_CHANNEL_DEPTH: usize = 64;

/// Fans engine events out to callbacks and channel subscribers.
///
/// Callbacks run on the processing thread, outside of any dispatcher lock.
#[derive(Default)]
pub struct EventDispatcher {
    silence_callback: Mutex<Option<SilenceCallback>>,
    silence_subscribers: Mutex<Vec<Sender<SilenceState>>>,
    stream_callback: Mutex<Option<StreamCallback>>,
    stream_subscribers: Mutex<Vec<Sender<Vec<u8>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_silence_callback(&self, callback: Option<SilenceCallback>) {
        *self.silence_callback.lock() = callback;
    }

    pub fn subscribe_silence(&self) -> Receiver<SilenceState> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.silence_subscribers.lock().push(tx);
        rx
    }

    pub fn emit_silence(&self, state: SilenceState) {
        let callback = self.silence_callback.lock().clone();
        if let Some(callback) = callback {
            callback(state);
        }
        self.silence_subscribers.lock().retain(|tx| tx.send(state).is_ok());
    }

    pub fn set_stream_callback(&self, callback: Option<StreamCallback>) {
        *self.stream_callback.lock() = callback;
    }

    pub fn subscribe_stream(&self) -> Receiver<Vec<u8>> {
        let (tx, rx) = crossbeam_channel::bounded(STREAM_CHANNEL_DEPTH);
        self.stream_subscribers.lock().push(tx);
        rx
    }

    pub fn has_stream_consumers(&self) -> bool {
        self.stream_callback.lock().is_some() || !self.stream_subscribers.lock().is_empty()
    }

    /// Deliver one encoded block. Full subscriber queues drop the block.
    pub fn emit_stream(&self, block: &[u8]) {
        let callback = self.stream_callback.lock().clone();
        if let Some(callback) = callback {
            callback(block);
        }

        let mut subscribers = self.stream_subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|tx| match tx.try_send(block.to_vec()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("stream subscriber is behind, dropping block");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
