use crate::models::audio_models::{AudioFormat, CaptureDevice};
use crate::models::error::CaptureError;
use crate::session::frame_sink::FrameSink;

/// Enumerates input devices and resolves ids to backend handles.
///
/// Implementations query the audio subsystem on every call so hot-plugged
/// devices show up without restarting.
pub trait DeviceCatalog {
    /// Backend-specific reference to a device that can be opened.
    type Handle: Send + 'static;

    fn list_devices(&self) -> Result<Vec<CaptureDevice>, CaptureError>;

    /// Resolve a device id. [`DEFAULT_DEVICE_ID`](crate::models::audio_models::DEFAULT_DEVICE_ID)
    /// selects the default input.
    fn resolve(&self, device_id: i32) -> Result<Self::Handle, CaptureError>;
}

/// Audio input backend driven by the engine.
pub trait CaptureBackend: DeviceCatalog + Send + Sync {
    /// Open `handle` in `format`. Captured audio must be pushed into `sink`
    /// from the device callback.
    fn open(
        &self,
        handle: Self::Handle,
        format: &AudioFormat,
        sink: FrameSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// An opened device. Dropping it closes the device and joins any backend thread.
pub trait CaptureStream: Send + Sync {
    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;
}
