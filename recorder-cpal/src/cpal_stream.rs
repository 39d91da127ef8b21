use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use recorder_core::models::error::CaptureError;
use recorder_core::traits::capture_backend::CaptureStream;
use recorder_core::{AudioFormat, FrameSink, SampleFormat};

use crate::device_catalog::{locate, CpalDevice};

type Reply = Sender<Result<(), CaptureError>>;

enum Command {
    Start(Reply),
    Stop(Reply),
    Close,
}

/// An opened `cpal` input stream.
///
/// `cpal::Stream` is not `Send` on every platform, so it is built, driven and
/// dropped on a dedicated thread. Start and stop are forwarded as commands
/// and wait for the thread's reply. Dropping closes the stream and joins the
/// thread.
pub struct CpalStream {
    device_name: String,
    commands: Sender<Command>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CpalStream {
    pub(crate) fn open(handle: CpalDevice, format: AudioFormat, sink: FrameSink) -> Result<Self, CaptureError> {
        let device_name = handle.name.clone();
        let (ready_tx, ready_rx) = bounded::<Result<(), CaptureError>>(1);
        let (commands, command_rx) = unbounded();

        let thread = thread::Builder::new()
            .name("cpal-capture".into())
            .spawn(move || match build(&handle, format, sink) {
                Ok((stream, running)) => {
                    let _ = ready_tx.send(Ok(()));
                    run(stream, running, command_rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| CaptureError::InitializationFailed(format!("failed to spawn capture thread: {}", e)))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::InitializationFailed("capture thread exited during open".into())));
        if let Err(e) = ready {
            let _ = thread.join();
            return Err(e);
        }

        log::info!("opened '{}' as {:?}", device_name, format);
        Ok(Self {
            device_name,
            commands,
            thread: Some(thread),
        })
    }

    /// Send a command and wait for its reply. `None` if the thread is gone.
    fn request(&self, command: impl FnOnce(Reply) -> Command) -> Option<Result<(), CaptureError>> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands.send(command(reply_tx)).ok()?;
        reply_rx.recv().ok()
    }
}

impl CaptureStream for CpalStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        self.request(Command::Start).unwrap_or_else(|| {
            Err(CaptureError::DeviceStartFailed(format!(
                "capture thread for '{}' is not running",
                self.device_name
            )))
        })
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.request(Command::Stop).unwrap_or(Ok(()))
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Close);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("capture thread for '{}' panicked", self.device_name);
            }
        }
        log::debug!("closed '{}'", self.device_name);
    }
}

// --- Stream thread ---

fn native_format(format: SampleFormat) -> cpal::SampleFormat {
    match format {
        SampleFormat::U8 => cpal::SampleFormat::U8,
        SampleFormat::S16 => cpal::SampleFormat::I16,
        // 24-bit sessions capture at 32 bits; the codec narrows on encode.
        SampleFormat::S24 | SampleFormat::S32 => cpal::SampleFormat::I32,
        SampleFormat::F32 => cpal::SampleFormat::F32,
    }
}

fn build(handle: &CpalDevice, format: AudioFormat, sink: FrameSink) -> Result<(cpal::Stream, Arc<AtomicBool>), CaptureError> {
    let device = locate(handle)?;
    let native = native_format(format.sample_format);

    let supported = device
        .supported_input_configs()
        .map_err(|e| CaptureError::InitializationFailed(format!("failed to query '{}': {}", handle.name, e)))?
        .any(|range| {
            range.channels() == format.channels
                && range.sample_format() == native
                && range.min_sample_rate().0 <= format.sample_rate
                && format.sample_rate <= range.max_sample_rate().0
        });
    if !supported {
        return Err(CaptureError::InitializationFailed(format!(
            "'{}' does not support {:?}",
            handle.name, format
        )));
    }

    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let running = Arc::new(AtomicBool::new(false));
    let gate = Arc::clone(&running);

    let stream = match format.sample_format {
        SampleFormat::U8 => input::<u8>(&device, &config, sink, gate, FrameSink::push_u8),
        SampleFormat::S16 => input::<i16>(&device, &config, sink, gate, FrameSink::push_i16),
        SampleFormat::S24 | SampleFormat::S32 => input::<i32>(&device, &config, sink, gate, FrameSink::push_i32),
        SampleFormat::F32 => input::<f32>(&device, &config, sink, gate, FrameSink::push),
    }?;
    Ok((stream, running))
}

fn input<T: cpal::SizedSample + 'static>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut sink: FrameSink,
    running: Arc<AtomicBool>,
    push: fn(&mut FrameSink, &[T]),
) -> Result<cpal::Stream, CaptureError> {
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if running.load(Ordering::Relaxed) {
                    push(&mut sink, data);
                }
            },
            |err| log::error!("input stream error: {}", err),
            None,
        )
        .map_err(|e| CaptureError::InitializationFailed(format!("failed to build input stream: {}", e)))
}

fn run(stream: cpal::Stream, running: Arc<AtomicBool>, commands: Receiver<Command>) {
    for command in commands.iter() {
        match command {
            Command::Start(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| CaptureError::DeviceStartFailed(e.to_string()));
                if result.is_ok() {
                    running.store(true, Ordering::Relaxed);
                }
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                running.store(false, Ordering::Relaxed);
                // Some hosts cannot pause; the gate already stops delivery.
                if let Err(e) = stream.pause() {
                    log::warn!("input stream could not pause: {}", e);
                }
                let _ = reply.send(Ok(()));
            }
            Command::Close => break,
        }
    }
    running.store(false, Ordering::Relaxed);
    drop(stream);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_formats_cover_every_sample_format() {
        assert_eq!(native_format(SampleFormat::U8), cpal::SampleFormat::U8);
        assert_eq!(native_format(SampleFormat::S16), cpal::SampleFormat::I16);
        assert_eq!(native_format(SampleFormat::S24), cpal::SampleFormat::I32);
        assert_eq!(native_format(SampleFormat::S32), cpal::SampleFormat::I32);
        assert_eq!(native_format(SampleFormat::F32), cpal::SampleFormat::F32);
    }
}
