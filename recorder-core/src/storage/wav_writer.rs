use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_models::AudioFormat;
use crate::models::error::CaptureError;
use crate::processing::wav_format;

/// Streaming WAV writer.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header]
/// [interleaved little-endian samples in the session format...]
/// ```
///
/// The length fields start at zero and are patched on every [`flush`](Self::flush),
/// so a file cut short by a crash is still readable up to the last flush.
pub struct WavFileWriter {
    file_path: PathBuf,
    format: AudioFormat,
    file: Option<BufWriter<File>>,
    data_bytes: u64,
}

impl WavFileWriter {
    /// Create the file and write a header with zero lengths.
    pub fn create(file_path: PathBuf, format: AudioFormat) -> Result<Self, CaptureError> {
        let file = File::create(&file_path).map_err(|e| {
            CaptureError::FailedToInitializeRecording(format!("failed to create {}: {}", file_path.display(), e))
        })?;
        let mut file = BufWriter::new(file);
        let header = wav_format::generate_wav_header(&format, 0);
        if let Err(e) = file.write_all(&header).and_then(|()| file.flush()) {
            drop(file);
            discard(&file_path);
            return Err(CaptureError::FailedToInitializeRecording(format!("failed to write header: {}", e)));
        }

        Ok(Self {
            file_path,
            format,
            file: Some(file),
            data_bytes: 0,
        })
    }

    /// Append encoded sample bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::FailedToWriteFile("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| CaptureError::FailedToWriteFile(format!("write failed: {}", e)))?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    /// Push buffered bytes to disk and patch the header to the current length.
    pub fn flush(&mut self) -> Result<(), CaptureError> {
        let data_bytes = self.data_bytes;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::FailedToWriteFile("file is not open".into()))?;
        patch_lengths(file, data_bytes).map_err(|e| CaptureError::FailedToWriteFile(format!("header patch failed: {}", e)))
    }

    /// Patch the header, sync, close and return the SHA-256 of the finished file.
    pub fn finalize(mut self) -> Result<String, CaptureError> {
        self.close()?;
        sha256_file(&self.file_path)
    }

    /// Audio bytes written so far, excluding the header.
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn frames_written(&self) -> u64 {
        self.data_bytes / self.format.block_align() as u64
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        patch_lengths(&mut file, self.data_bytes)
            .and_then(|_| file.get_ref().sync_all())
            .map_err(|e| CaptureError::FailedToWriteFile(format!("failed to finalize {}: {}", self.file_path.display(), e)))
    }
}

impl Drop for WavFileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("{}", e);
        }
    }
}

fn patch_lengths(file: &mut BufWriter<File>, data_bytes: u64) -> io::Result<()> {
    file.flush()?;
    let inner = file.get_mut();
    let end = inner.stream_position()?;

    inner.seek(SeekFrom::Start(wav_format::RIFF_SIZE_OFFSET))?;
    inner.write_all(&wav_format::riff_size(data_bytes).to_le_bytes())?;
    inner.seek(SeekFrom::Start(wav_format::DATA_SIZE_OFFSET))?;
    inner.write_all(&wav_format::data_size_field(data_bytes).to_le_bytes())?;

    inner.seek(SeekFrom::Start(end))?;
    Ok(())
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let mut file =
        File::open(path).map_err(|e| CaptureError::FailedToWriteFile(format!("failed to read file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| CaptureError::FailedToWriteFile(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Remove a partially written file, ignoring a missing one.
fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}
