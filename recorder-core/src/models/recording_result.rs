use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::AudioFormat;

/// Result returned when a recording session is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub frames_written: u64,
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
}

/// Metadata stored alongside a recording.
///
/// Serializable for the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    pub format: AudioFormat,
    pub frames_written: u64,
}

impl RecordingMetadata {
    pub fn new(format: AudioFormat, frames_written: u64, file_path: &str, checksum: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs: format.frames_to_secs(frames_written),
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            format,
            frames_written,
        }
    }
}
