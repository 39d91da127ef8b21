use cpal::traits::{DeviceTrait, HostTrait};

use recorder_core::models::error::CaptureError;
use recorder_core::traits::capture_backend::{CaptureBackend, CaptureStream, DeviceCatalog};
use recorder_core::{AudioFormat, CaptureDevice, FrameSink, DEFAULT_DEVICE_ID};

use crate::cpal_stream::CpalStream;

/// Openable reference to an input device of the default host.
///
/// `index` is `None` for the platform default input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpalDevice {
    pub index: Option<usize>,
    pub name: String,
}

/// Input devices of the default `cpal` host.
///
/// Every call re-queries the host, so hot-plugged devices appear without
/// restarting. Device ids are enumeration indices.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

fn device_name(device: &cpal::Device, index: usize) -> String {
    device.name().unwrap_or_else(|_| format!("Input {}", index))
}

impl DeviceCatalog for CpalBackend {
    type Handle = CpalDevice;

    fn list_devices(&self) -> Result<Vec<CaptureDevice>, CaptureError> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::InitializationFailed(format!("failed to enumerate input devices: {}", e)))?;

        let list: Vec<CaptureDevice> = devices
            .enumerate()
            .map(|(index, device)| {
                let name = device_name(&device, index);
                let channels = device.default_input_config().map(|c| c.channels()).unwrap_or(0);
                CaptureDevice {
                    id: index as i32,
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                    channels,
                }
            })
            .collect();
        log::debug!("{} input devices on host {:?}", list.len(), host.id());
        Ok(list)
    }

    fn resolve(&self, device_id: i32) -> Result<CpalDevice, CaptureError> {
        let host = cpal::default_host();
        if device_id == DEFAULT_DEVICE_ID {
            let device = host
                .default_input_device()
                .ok_or(CaptureError::DeviceNotFound(device_id))?;
            return Ok(CpalDevice {
                index: None,
                name: device_name(&device, 0),
            });
        }

        let index = usize::try_from(device_id).map_err(|_| CaptureError::DeviceNotFound(device_id))?;
        let device = host
            .input_devices()
            .map_err(|e| CaptureError::InitializationFailed(format!("failed to enumerate input devices: {}", e)))?
            .nth(index)
            .ok_or(CaptureError::DeviceNotFound(device_id))?;
        Ok(CpalDevice {
            index: Some(index),
            name: device_name(&device, index),
        })
    }
}

impl CaptureBackend for CpalBackend {
    fn open(
        &self,
        handle: CpalDevice,
        format: &AudioFormat,
        sink: FrameSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        format.validate()?;
        let stream = CpalStream::open(handle, *format, sink)?;
        Ok(Box::new(stream))
    }
}

/// Find the device `handle` refers to. Indices can shift after a hot-plug,
/// so a name mismatch falls back to a lookup by name.
pub(crate) fn locate(handle: &CpalDevice) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    let not_found = || CaptureError::InitializationFailed(format!("input device '{}' is gone", handle.name));

    let Some(index) = handle.index else {
        return host.default_input_device().ok_or_else(not_found);
    };
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| CaptureError::InitializationFailed(format!("failed to enumerate input devices: {}", e)))?
        .collect();

    let position = if devices.get(index).map(|d| device_name(d, index)).as_deref() == Some(handle.name.as_str()) {
        Some(index)
    } else {
        devices
            .iter()
            .enumerate()
            .position(|(i, d)| device_name(d, i) == handle.name)
    };
    position
        .and_then(|p| devices.into_iter().nth(p))
        .ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_devices_does_not_panic() {
        let _ = CpalBackend::new().list_devices();
    }

    #[test]
    fn listed_ids_are_indices() {
        if let Ok(devices) = CpalBackend::new().list_devices() {
            for (i, device) in devices.iter().enumerate() {
                assert_eq!(device.id, i as i32);
            }
        }
    }

    #[test]
    fn negative_ids_other_than_default_are_unknown() {
        assert_eq!(CpalBackend::new().resolve(-7), Err(CaptureError::DeviceNotFound(-7)));
    }

    #[test]
    fn resolve_default_does_not_panic() {
        if let Ok(handle) = CpalBackend::new().resolve(DEFAULT_DEVICE_ID) {
            assert!(handle.index.is_none());
        }
    }
}
